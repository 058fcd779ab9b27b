use scraper::{ElementRef, Html, Selector};

/// Elements whose entire subtree is non-content noise.
const NOISE_TAGS: &[&str] = &["script", "style", "nav", "footer", "noscript", "iframe"];

/// Extract the readable text of a source page: the `<main>` region when one
/// exists, otherwise the whole `<body>`, with scripts, styles, navigation and
/// footer regions stripped and whitespace collapsed to single spaces.
#[inline]
pub fn extract_main_text(html: &str) -> String {
    let document = Html::parse_document(html);

    // Selectors are static and known-valid.
    #[expect(clippy::unwrap_used)]
    let main_selector = Selector::parse("main").unwrap();
    #[expect(clippy::unwrap_used)]
    let body_selector = Selector::parse("body").unwrap();

    let region = document
        .select(&main_selector)
        .next()
        .or_else(|| document.select(&body_selector).next());

    let mut text = String::new();
    if let Some(element) = region {
        collect_text(element, &mut text);
    }

    collapse_whitespace(&text)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    if NOISE_TAGS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}
