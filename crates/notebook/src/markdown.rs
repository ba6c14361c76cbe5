//! Markdown-to-HTML rendering for markdown cell previews.

use pulldown_cmark::{html, Options, Parser};

/// Render markdown source to an HTML fragment.
pub fn render_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, options);
    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}
