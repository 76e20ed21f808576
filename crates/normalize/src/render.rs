use pulldown_cmark::{html, Options, Parser};

/// Render CommonMark (with tables, strikethrough and task lists) to HTML.
pub fn render_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_heading_and_emphasis() {
        let html = render_html("# Title\n\nSome *text*.");
        assert_eq!(html, "<h1>Title</h1>\n<p>Some <em>text</em>.</p>\n");
    }

    #[test]
    fn renders_tables() {
        let html = render_html("| a |\n|---|\n| b |");
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>b</td>"));
    }
}
