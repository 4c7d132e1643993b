//! HTML to markdown conversion.
//!
//! The markup is parsed with `scraper`, chrome elements are skipped, and the
//! first content root that yields text is rendered as markdown: `#` headings,
//! paragraphs separated by blank lines, `-` list items, `**bold**` runs and
//! pipe tables. Malformed markup degrades to whatever text the parser recovers.

use crate::text::normalize_whitespace;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

const CHROME_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "svg", "iframe", "form",
    "button", "head", "template",
];

const FALLBACK_ROOTS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// Renders the main content of `markup` as markdown.
///
/// `content_selectors` are tried before the generic roots. Returns an empty
/// string when no root carries text.
pub fn html_to_markdown(markup: &str, content_selectors: &[&str]) -> String {
    let document = Html::parse_document(markup);

    for selector in content_selectors.iter().chain(FALLBACK_ROOTS) {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for root in document.select(&selector) {
            let rendered = render(root);
            if !rendered.is_empty() {
                return rendered;
            }
        }
    }

    String::new()
}

/// Undoes the escaping some portals leave in JSON-wrapped markup.
pub fn repair_escaped_markup(markup: &str) -> String {
    markup
        .replace("\\\"", "\"")
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\t", " ")
}

/// Text of the first element matching `selector`.
pub fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(inline_text)
        .filter(|text| !text.is_empty())
}

/// Value of `attribute` on the first element matching `selector`.
pub fn select_attr(document: &Html, selector: &str, attribute: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .find_map(|element| element.value().attr(attribute))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn render(root: ElementRef<'_>) -> String {
    let mut writer = MarkdownWriter::default();
    writer.walk(root);
    writer.finish()
}

#[derive(Default)]
struct MarkdownWriter {
    blocks: Vec<String>,
    line: String,
}

impl MarkdownWriter {
    fn walk(&mut self, element: ElementRef<'_>) {
        for node in element.children() {
            if let Node::Text(text) = node.value() {
                let text: &str = text;
                self.line.push_str(text);
                continue;
            }
            let Some(child) = ElementRef::wrap(node) else {
                continue;
            };
            let name = child.value().name();
            if CHROME_TAGS.contains(&name) {
                continue;
            }
            match name {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    self.flush();
                    let level = name[1..].parse::<usize>().unwrap_or(1);
                    let text = inline_text(child);
                    if !text.is_empty() {
                        self.blocks.push(format!("{} {text}", "#".repeat(level)));
                    }
                }
                "br" => self.line.push('\n'),
                "hr" => {
                    self.flush();
                    self.blocks.push("---".to_string());
                }
                "ul" | "ol" => {
                    self.flush();
                    if let Some(list) = render_list(child, name == "ol") {
                        self.blocks.push(list);
                    }
                }
                "table" => {
                    self.flush();
                    self.table(child);
                }
                "strong" | "b" => {
                    let text = inline_text(child);
                    if !text.is_empty() {
                        self.line.push_str(&format!(" **{text}** "));
                    }
                }
                "p" | "div" | "section" | "article" | "main" | "body" | "center" | "blockquote"
                | "li" | "dl" | "dd" | "dt" | "pre" | "address" | "figure" | "tr" | "td"
                | "th" | "tbody" | "thead" => {
                    self.flush();
                    self.walk(child);
                    self.flush();
                }
                _ => {
                    self.line.push(' ');
                    self.walk(child);
                    self.line.push(' ');
                }
            }
        }
    }

    fn table(&mut self, table: ElementRef<'_>) {
        let rows = table_rows(table);
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width <= 1 {
            // Single-column layout tables read as paragraphs.
            for cell in rows.into_iter().flatten() {
                if !cell.is_empty() {
                    self.blocks.push(cell);
                }
            }
            return;
        }

        let mut lines = Vec::with_capacity(rows.len() + 1);
        for (index, row) in rows.iter().enumerate() {
            let mut cells: Vec<String> = row.iter().map(|cell| cell.replace('|', "\\|")).collect();
            cells.resize(width, String::new());
            lines.push(format!("| {} |", cells.join(" | ")));
            if index == 0 {
                lines.push(format!("|{}", " --- |".repeat(width)));
            }
        }
        self.blocks.push(lines.join("\n"));
    }

    fn flush(&mut self) {
        let paragraph = self
            .line
            .split('\n')
            .map(normalize_whitespace)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        self.line.clear();
        if !paragraph.is_empty() {
            self.blocks.push(paragraph);
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.blocks.join("\n\n")
    }
}

fn render_list(list: ElementRef<'_>, ordered: bool) -> Option<String> {
    let items: Vec<String> = list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "li")
        .map(inline_text)
        .filter(|text| !text.is_empty())
        .enumerate()
        .map(|(index, text)| {
            if ordered {
                format!("{}. {text}", index + 1)
            } else {
                format!("- {text}")
            }
        })
        .collect();
    (!items.is_empty()).then(|| items.join("\n"))
}

fn table_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    let Ok(row_selector) = Selector::parse("tr") else {
        return Vec::new();
    };
    table
        .select(&row_selector)
        .filter(|row| owning_table(*row).map(|owner| owner.id()) == Some(table.id()))
        .map(|row| {
            row.children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                .map(inline_text)
                .collect::<Vec<_>>()
        })
        .filter(|cells| cells.iter().any(|cell| !cell.is_empty()))
        .collect()
}

fn owning_table(row: ElementRef<'_>) -> Option<ElementRef<'_>> {
    row.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "table")
}

/// Whitespace-normalized text below `element`, skipping chrome elements.
pub(crate) fn inline_text(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    collect_text(element, &mut text);
    normalize_whitespace(&text)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for node in element.children() {
        if let Node::Text(text) = node.value() {
            let text: &str = text;
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(node) else {
            continue;
        };
        let name = child.value().name();
        if CHROME_TAGS.contains(&name) {
            continue;
        }
        out.push(' ');
        if name != "br" {
            collect_text(child, out);
            out.push(' ');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headings_paragraphs_and_chrome() {
        let markup = r#"
            <html><head><title>T</title><style>p { color: red }</style></head>
            <body>
              <nav>Ana Sayfa | Kararlar</nav>
              <h2>T.C. YARGITAY</h2>
              <p>Taraflar arasındaki   davada <b>karar</b> verildi.</p>
              <script>var x = 1;</script>
              <p>İkinci paragraf.</p>
              <footer>© Portal</footer>
            </body></html>"#;

        let markdown = html_to_markdown(markup, &[]);
        assert_eq!(
            markdown,
            "## T.C. YARGITAY\n\nTaraflar arasındaki davada **karar** verildi.\n\nİkinci paragraf."
        );
    }

    #[test]
    fn tables_become_pipe_tables() {
        let markup = "<table><tr><th>Esas</th><th>Karar</th></tr>\
                      <tr><td>2023/1</td><td>2024/2</td></tr></table>";

        let markdown = html_to_markdown(markup, &[]);
        assert_eq!(
            markdown,
            "| Esas | Karar |\n| --- | --- |\n| 2023/1 | 2024/2 |"
        );
    }

    #[test]
    fn single_column_tables_read_as_paragraphs() {
        let markup = "<table><tr><td>Birinci</td></tr><tr><td>İkinci</td></tr></table>";
        assert_eq!(html_to_markdown(markup, &[]), "Birinci\n\nİkinci");
    }

    #[test]
    fn lists_keep_their_markers() {
        let markup = "<ol><li>Bir</li><li>İki</li></ol><ul><li>Madde</li></ul>";
        assert_eq!(html_to_markdown(markup, &[]), "1. Bir\n2. İki\n\n- Madde");
    }

    #[test]
    fn content_selectors_win_over_body() {
        let markup = r#"<body><div class="menu">Menü</div>
            <div id="Karar"><span class="kararHtml"><p>Karar metni</p></span></div></body>"#;
        assert_eq!(
            html_to_markdown(markup, &["div#Karar span.kararHtml"]),
            "Karar metni"
        );
    }

    #[test]
    fn unclosed_tags_degrade_gracefully() {
        let markup = "<div><p>Yarım kalmış <b>belge";
        assert_eq!(html_to_markdown(markup, &[]), "Yarım kalmış **belge**");
    }

    #[test]
    fn empty_body_renders_nothing() {
        assert!(html_to_markdown("<html><body><script>x()</script></body></html>", &[]).is_empty());
    }

    #[test]
    fn line_breaks_survive() {
        assert_eq!(html_to_markdown("<p>Bir<br>İki</p>", &[]), "Bir\nİki");
    }

    #[test]
    fn escaped_markup_is_repaired() {
        let repaired = repair_escaped_markup(r#"<p class=\"x\">a\r\nb</p>"#);
        assert_eq!(repaired, "<p class=\"x\">a\nb</p>");
    }
}
