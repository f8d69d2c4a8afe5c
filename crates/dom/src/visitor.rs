//! Element visitor
//!
//! Closures cover most traversals (`DomArena::traverse_df`). A visitor
//! object is for the cases where state outlives one traversal, e.g. a
//! checker that walks several documents of the forest in turn.

use crate::arena::DomArena;
use crate::types::DomElement;

/// Called once per element, in document pre-order
pub trait DomElementVisitor {
    fn visit(&mut self, arena: &DomArena, element: &DomElement);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeId;

    struct ImageCollector(Vec<NodeId>);

    impl DomElementVisitor for ImageCollector {
        fn visit(&mut self, _arena: &DomArena, element: &DomElement) {
            if element.is_tag("img") {
                self.0.push(element.node_id);
            }
        }
    }

    #[test]
    fn test_visitor_state_spans_documents() {
        let mut arena = DomArena::new();
        let top = arena.add_document("http://a.com/", "http://a.com/");
        let root = arena.add_element(top, DomElement::new(top, "html")).unwrap();
        let img = arena.add_element(top, DomElement::new(top, "img")).unwrap();
        arena.set_root(top, root).unwrap();
        arena.append_child(root, img).unwrap();

        let other = arena.add_document("http://a.com/f", "http://a.com/f");
        let other_img = arena.add_element(other, DomElement::new(other, "IMG")).unwrap();
        arena.set_root(other, other_img).unwrap();

        let mut collector = ImageCollector(Vec::new());
        arena.accept(top, &mut collector).unwrap();
        assert_eq!(collector.0, vec![img]);

        arena.accept(other, &mut collector).unwrap();
        assert_eq!(collector.0, vec![img, other_img]);
    }
}
