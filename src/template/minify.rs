//! HTML whitespace and comment collapsing for rendered templates.
//!
//! # Rules
//!
//! - Runs of whitespace in text collapse to a single space.
//! - Whitespace next to block-level tags and at the document edges is
//!   dropped; next to inline tags one space is kept.
//! - Comments are removed, except conditional comments (`<!--[if ...`).
//! - `pre`, `textarea`, `script` and `style` contents are copied verbatim.
//! - Whitespace inside a tag collapses outside quoted attribute values.
//!
//! # Constraints
//!
//! - Never panics; malformed markup (unterminated tag or comment) is an
//!   `Err` so the caller can report it.
//! - Deterministic: same input → same output.

const BLOCK_TAGS: &[&str] = &[
    "!doctype", "address", "article", "aside", "blockquote", "body", "br", "dd", "details", "dialog",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "head", "header", "hr", "html", "li", "link", "main", "meta", "nav", "ol",
    "option", "p", "script", "section", "select", "style", "summary", "table", "tbody", "td",
    "tfoot", "th", "thead", "title", "tr", "ul",
];

const RAW_TAGS: &[&str] = &["pre", "textarea", "script", "style"];

enum Token {
    Text(String),
    Tag { block: bool, markup: String },
}

/// Minify rendered HTML.
pub fn minify_html(input: &str) -> Result<String, String> {
    let tokens = tokenize(input)?;
    let mut output = String::with_capacity(input.len());

    for (i, token) in tokens.iter().enumerate() {
        match token {
            Token::Tag { markup, .. } => output.push_str(markup),
            Token::Text(text) => {
                let mut text = collapse_whitespace(text);
                let block_before = i == 0 || matches!(tokens[i - 1], Token::Tag { block: true, .. });
                let block_after = tokens
                    .get(i + 1)
                    .map_or(true, |t| matches!(t, Token::Tag { block: true, .. }));
                if block_before {
                    text = text.trim_start().to_string();
                }
                if block_after {
                    text = text.trim_end().to_string();
                }
                output.push_str(&text);
            }
        }
    }

    Ok(output)
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while let Some(lt) = rest.find('<') {
        text.push_str(&rest[..lt]);
        rest = &rest[lt..];

        if let Some(after) = rest.strip_prefix("<!--") {
            let end = after
                .find("-->")
                .ok_or_else(|| "unterminated comment".to_string())?;
            if after.starts_with("[if") {
                flush(&mut tokens, &mut text);
                tokens.push(Token::Tag {
                    block: false,
                    markup: rest[..4 + end + 3].to_string(),
                });
            }
            rest = &after[end + 3..];
            continue;
        }

        if !starts_tag(rest) {
            text.push('<');
            rest = &rest[1..];
            continue;
        }

        flush(&mut tokens, &mut text);
        let (markup, len) = scan_tag(rest)?;
        let name = tag_name(&markup);
        let closing = markup.starts_with("</");
        rest = &rest[len..];

        tokens.push(Token::Tag {
            block: BLOCK_TAGS.contains(&name.as_str()),
            markup,
        });

        if !closing && RAW_TAGS.contains(&name.as_str()) {
            let end = find_closing(rest, &name).unwrap_or(rest.len());
            if end > 0 {
                // Raw content behaves like an inline tag: never trimmed.
                tokens.push(Token::Tag {
                    block: false,
                    markup: rest[..end].to_string(),
                });
            }
            rest = &rest[end..];
        }
    }

    text.push_str(rest);
    flush(&mut tokens, &mut text);
    Ok(tokens)
}

fn flush(tokens: &mut Vec<Token>, text: &mut String) {
    if !text.is_empty() {
        tokens.push(Token::Text(std::mem::take(text)));
    }
}

fn starts_tag(s: &str) -> bool {
    let mut chars = s.chars().skip(1);
    match chars.next() {
        Some('/') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
        Some('!') => true,
        Some(c) => c.is_ascii_alphabetic(),
        None => false,
    }
}

// Returns the normalized tag markup and the byte length consumed.
fn scan_tag(s: &str) -> Result<(String, usize), String> {
    let mut markup = String::new();
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    for (i, ch) in s.char_indices() {
        match quote {
            Some(q) => {
                markup.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '>' => {
                markup.push('>');
                return Ok((markup, i + 1));
            }
            None if ch.is_whitespace() => pending_space = true,
            None => {
                if pending_space && ch != '/' && ch != '=' && !markup.ends_with('=') {
                    markup.push(' ');
                } else if pending_space && ch == '/' {
                    markup.push(' ');
                }
                pending_space = false;
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
                markup.push(ch);
            }
        }
    }

    Err("unterminated tag".to_string())
}

fn tag_name(markup: &str) -> String {
    markup
        .trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect::<String>()
        .to_ascii_lowercase()
}

fn find_closing(s: &str, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    let lower = s.to_ascii_lowercase();
    lower.find(&needle)
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for ch in s.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_tag_whitespace() {
        assert_eq!(minify_html("  <h1>  Test   </h1>").unwrap(), "<h1>Test</h1>");
    }

    #[test]
    fn test_inline_tags_keep_one_space() {
        assert_eq!(
            minify_html("<p>Hello   <b>big</b>   world</p>").unwrap(),
            "<p>Hello <b>big</b> world</p>"
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(minify_html("<div><!-- gone --></div>").unwrap(), "<div></div>");
        assert_eq!(
            minify_html("<!--[if IE]>x<![endif]-->").unwrap(),
            "<!--[if IE]>x<![endif]-->"
        );
    }

    #[test]
    fn test_raw_content_is_preserved() {
        let html = "<div>\n<pre>  a\n   b </pre>\n</div>";
        assert_eq!(minify_html(html).unwrap(), "<div><pre>  a\n   b </pre></div>");

        let script = "<script>\n if (a < b) { x(); }\n</script>";
        assert_eq!(minify_html(script).unwrap(), script);
    }

    #[test]
    fn test_tag_attributes_are_normalized() {
        assert_eq!(
            minify_html("<a   href = \"/x  y\"\n class='c'>go</a>").unwrap(),
            "<a href=\"/x  y\" class='c'>go</a>"
        );
    }

    #[test]
    fn test_literal_less_than_is_text() {
        assert_eq!(minify_html("<p>1 < 2</p>").unwrap(), "<p>1 < 2</p>");
    }

    #[test]
    fn test_malformed_markup_is_an_error() {
        assert!(minify_html("<div class=\"x").is_err());
        assert!(minify_html("<!-- open").is_err());
    }
}
