use crate::formatter::{Argument, RuleFormatter};
use crate::l10n::UserFacingString;
use crate::pagespeed_input::PagespeedInput;
use crate::result_provider::ResultProvider;
use crate::results::{Finding, FindingDetails};
use crate::rule::Rule;
use crate::rule_input::RuleInput;
use crate::uri_util;
use dom::{DomArena, DomElement, DomElementVisitor};
use std::collections::BTreeMap;
use std::io::Cursor;

/// `<img>` elements without both a `width` and a `height` attribute. The
/// browser has to reflow once the image arrives and its size is known.
#[derive(Debug, Default)]
pub struct SpecifyImageDimensions;

impl SpecifyImageDimensions {
    pub fn new() -> Self {
        Self
    }
}

/// Width and height from the image header, without decoding pixels
fn image_dimensions(body: &[u8]) -> Option<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(body))
        .with_guessed_format()
        .ok()?;
    match reader.into_dimensions() {
        Ok(dimensions) => Some(dimensions),
        Err(e) => {
            tracing::debug!("Unable to read image dimensions: {}", e);
            None
        }
    }
}

struct ImageDimensionsChecker<'r, 'p, 'q> {
    input: &'r RuleInput<'p>,
    base_url: String,
    provider: &'r mut ResultProvider<'q>,
}

impl DomElementVisitor for ImageDimensionsChecker<'_, '_, '_> {
    fn visit(&mut self, _arena: &DomArena, element: &DomElement) {
        if !element.is_tag("IMG") || (element.has_width_specified() && element.has_height_specified()) {
            return;
        }
        let Some(src) = element.attr("src") else { return };
        let Some(url) = uri_util::resolve(&self.base_url, src.trim()) else {
            return;
        };
        // inline data: images cost no fetch
        if !matches!(uri_util::scheme(&url).as_deref(), Some("http" | "https")) {
            return;
        }

        let pagespeed_input = self.input.pagespeed_input();
        let dimensions = pagespeed_input
            .resources()
            .id_for_url(&url)
            .map(|id| self.input.final_redirect_target(id))
            .and_then(|id| self.input.resource(id))
            .and_then(|resource| image_dimensions(resource.response_body()));

        let finding = self.provider.new_result();
        finding.resource_urls.push(url);
        finding.savings.page_reflows_saved = 1;
        if let Some((expected_width, expected_height)) = dimensions {
            finding.details = Some(FindingDetails::ImageDimensions {
                expected_width,
                expected_height,
            });
        }
    }
}

/// Documents of the page whose markup was itself captured
fn captured_documents(input: &PagespeedInput) -> Vec<(&DomArena, dom::DocumentId, String)> {
    let Some((arena, top)) = input.dom() else {
        return Vec::new();
    };
    let documents = match dom::utils::collect_frame_documents(arena, top) {
        Ok(documents) => documents,
        Err(e) => {
            tracing::warn!("Unable to walk frame documents: {}", e);
            return Vec::new();
        }
    };
    documents
        .into_iter()
        .filter_map(|id| {
            let document = arena.document(id).ok()?;
            input.resource_with_url(&document.document_url)?;
            let base = if document.base_url.is_empty() {
                &document.document_url
            } else {
                &document.base_url
            };
            Some((arena, id, base.clone()))
        })
        .collect()
}

impl Rule for SpecifyImageDimensions {
    fn name(&self) -> &str {
        "SpecifyImageDimensions"
    }

    fn header(&self) -> UserFacingString {
        UserFacingString::new("Specify image dimensions")
    }

    fn append_results(&self, input: &RuleInput<'_>, provider: &mut ResultProvider<'_>) -> bool {
        for (arena, document, base_url) in captured_documents(input.pagespeed_input()) {
            let mut checker = ImageDimensionsChecker {
                input,
                base_url,
                provider: &mut *provider,
            };
            if let Err(e) = arena.accept(document, &mut checker) {
                tracing::error!("Failed to traverse DOM document {}: {}", document, e);
                return false;
            }
        }
        true
    }

    fn format_results(&self, results: &[&Finding], formatter: &mut RuleFormatter<'_>) {
        if results.is_empty() {
            return;
        }

        // one line per image, however many elements use it
        let mut uses: BTreeMap<&str, (&Finding, i64)> = BTreeMap::new();
        for result in results {
            if result.resource_urls.len() != 1 {
                tracing::error!(
                    "Unexpected number of resource URLs. Expected 1, got {}",
                    result.resource_urls.len()
                );
                continue;
            }
            uses.entry(result.resource_urls[0].as_str()).or_insert((result, 0)).1 += 1;
        }

        let mut block = formatter.add_url_block(
            &UserFacingString::new("The following image(s) are missing width and/or height attributes."),
            &[],
        );
        for (url, (result, count)) in uses {
            let Some(FindingDetails::ImageDimensions {
                expected_width,
                expected_height,
            }) = &result.details
            else {
                block.add_url(url);
                continue;
            };
            let mut args = vec![
                Argument::url("URL", url),
                Argument::integer("WIDTH", i64::from(*expected_width)),
                Argument::integer("HEIGHT", i64::from(*expected_height)),
            ];
            let format = if count > 1 {
                args.push(Argument::integer("COUNT", count));
                "%(URL)s (Dimensions: %(WIDTH)s x %(HEIGHT)s) (%(COUNT)s uses)"
            } else {
                "%(URL)s (Dimensions: %(WIDTH)s x %(HEIGHT)s)"
            };
            block.add_url_result(&UserFacingString::new(format), &args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::Formatter;
    use crate::l10n::BasicLocalizer;
    use crate::resource::Resource;
    use crate::results::RuleResults;
    use crate::rules::test_util::{redirect, resource};
    use dom::DocumentId;

    // 3x2 RGB
    const PNG_3X2: &[u8] = &[
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x03, 0x00, 0x00, 0x00, 0x02, 0x08, 0x02, 0x00, 0x00, 0x00, 0x12,
        0x16, 0xf1, 0x4d, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x60,
        0xc0, 0x04, 0x00, 0x00, 0x14, 0x00, 0x01, 0x7d, 0xfe, 0x1e, 0xee, 0x00, 0x00, 0x00, 0x00,
        0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn png(url: &str) -> Resource {
        let mut r = resource(url, "image/png", "");
        r.set_response_body(PNG_3X2);
        r
    }

    fn add_children(arena: &mut DomArena, document: DocumentId, elements: Vec<DomElement>) -> Vec<dom::NodeId> {
        let root = arena.add_element(document, DomElement::new(document, "html")).unwrap();
        arena.set_root(document, root).unwrap();
        elements
            .into_iter()
            .map(|element| {
                let node = arena.add_element(document, element).unwrap();
                arena.append_child(root, node).unwrap();
                node
            })
            .collect()
    }

    fn page(frame_captured: bool) -> PagespeedInput {
        let mut arena = DomArena::new();
        let top = arena.add_document("http://a.com/", "http://a.com/");
        let nodes = add_children(
            &mut arena,
            top,
            vec![
                DomElement::new(top, "img").with_attr("src", "a.png"),
                DomElement::new(top, "img").with_attr("src", "a.png").with_attr("width", "3"),
                DomElement::new(top, "img")
                    .with_attr("src", "sized.png")
                    .with_attr("width", "3")
                    .with_attr("height", "2"),
                DomElement::new(top, "img").with_attr("src", "/old.png"),
                DomElement::new(top, "img").with_attr("src", "data:image/png;base64,AAAA"),
                DomElement::new(top, "img").with_attr("src", "not-an-image.png"),
                DomElement::new(top, "iframe").with_attr("src", "http://b.com/frame.html"),
            ],
        );
        let frame = arena.add_document("http://b.com/frame.html", "http://b.com/frame.html");
        add_children(
            &mut arena,
            frame,
            vec![DomElement::new(frame, "img").with_attr("src", "f.png")],
        );
        arena.set_content_document(nodes[6], frame).unwrap();

        let mut input = PagespeedInput::new();
        let mut resources = vec![
            resource("http://a.com/", "text/html", "<html></html>"),
            png("http://a.com/a.png"),
            png("http://a.com/sized.png"),
            redirect("http://a.com/old.png", "http://a.com/new.png"),
            png("http://a.com/new.png"),
            resource("http://a.com/not-an-image.png", "image/png", "garbage"),
            png("http://b.com/f.png"),
        ];
        if frame_captured {
            resources.push(resource("http://b.com/frame.html", "text/html", "<html></html>"));
        }
        for r in resources {
            assert!(input.add_resource(r));
        }
        assert!(input.set_dom(arena, top));
        input.freeze().unwrap();
        input
    }

    fn run(input: &PagespeedInput) -> RuleResults {
        let mut rule_input = RuleInput::new(input);
        rule_input.init().unwrap();
        let mut results = RuleResults::new("SpecifyImageDimensions");
        assert!(SpecifyImageDimensions::new().append_results(&rule_input, &mut ResultProvider::new(&mut results)));
        results
    }

    fn dimensions(width: u32, height: u32) -> Option<FindingDetails> {
        Some(FindingDetails::ImageDimensions {
            expected_width: width,
            expected_height: height,
        })
    }

    #[test]
    fn test_image_dimensions() {
        assert_eq!(image_dimensions(PNG_3X2), Some((3, 2)));
        assert_eq!(image_dimensions(b"garbage"), None);
    }

    #[test]
    fn test_missing_dimensions() {
        let input = page(true);
        let results = run(&input);
        let found: Vec<_> = results
            .results
            .iter()
            .map(|f| (f.first_url().unwrap(), f.details.clone()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("http://a.com/a.png", dimensions(3, 2)),
                ("http://a.com/a.png", dimensions(3, 2)),
                // dimensions come from the end of the redirect chain
                ("http://a.com/old.png", dimensions(3, 2)),
                ("http://a.com/not-an-image.png", None),
                ("http://b.com/f.png", dimensions(3, 2)),
            ]
        );
        assert!(results.results.iter().all(|f| f.savings.page_reflows_saved == 1));
    }

    #[test]
    fn test_uncaptured_frame_skipped() {
        let input = page(false);
        let results = run(&input);
        assert_eq!(results.results.len(), 4);
        assert!(results.results.iter().all(|f| !f.resource_urls[0].starts_with("http://b.com/")));
    }

    #[test]
    fn test_no_dom() {
        let mut input = PagespeedInput::new();
        assert!(input.add_resource(png("http://a.com/a.png")));
        input.freeze().unwrap();
        assert!(run(&input).results.is_empty());
    }

    #[test]
    fn test_format() {
        let input = page(true);
        let results = run(&input);
        let rule = SpecifyImageDimensions::new();
        let localizer = BasicLocalizer;
        let mut formatter = Formatter::new(&localizer);
        {
            let findings: Vec<_> = results.results.iter().collect();
            let mut rule_formatter = formatter.add_rule(&rule, Some(50), 1.0);
            rule.format_results(&findings, &mut rule_formatter);
        }
        let blocks = &formatter.results().rule_results[0].url_blocks;
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].header.as_ref().unwrap().render_plain(),
            "The following image(s) are missing width and/or height attributes."
        );
        let lines: Vec<_> = blocks[0].urls.iter().map(|u| u.result.render_plain()).collect();
        assert_eq!(
            lines,
            vec![
                "http://a.com/a.png (Dimensions: 3 x 2) (2 uses)",
                "http://a.com/not-an-image.png",
                "http://a.com/old.png (Dimensions: 3 x 2)",
                "http://b.com/f.png (Dimensions: 3 x 2)",
            ]
        );
    }
}
