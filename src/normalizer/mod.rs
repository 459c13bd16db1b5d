//! Comment normalization shared by all site adapters.
//!
//! Sites deliver post bodies as HTML fragments. [`CommentParser`] turns them
//! into plain text and extracts the derived fields a [`Post`](crate::domain::Post)
//! carries: quoted post numbers and external links.

use html_escape::decode_html_entities;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedComment {
    pub text: String,
    pub quotes: Vec<u64>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommentParser {
    internal_domains: Vec<String>,
}

impl CommentParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links to these hosts are treated as quotes instead of external links.
    pub fn with_internal_domains(domains: &[&str]) -> Self {
        Self {
            internal_domains: domains.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn is_internal(&self, host: &str) -> bool {
        self.internal_domains.iter().any(|d| d.eq_ignore_ascii_case(host))
    }

    pub fn parse(&self, comment: &str) -> ParsedComment {
        let text = html_to_text(comment);

        let mut quotes = Vec::new();
        collect_quote_numbers(&text, &mut quotes);

        let mut links = Vec::new();
        for word in text.split_whitespace() {
            let candidate = word.trim_end_matches(|c: char| {
                matches!(c, '.' | ',' | ')' | '!' | '?' | ';' | ':' | '"' | '\'')
            });
            if !(candidate.starts_with("http://") || candidate.starts_with("https://")) {
                continue;
            }
            let Ok(url) = Url::parse(candidate) else {
                continue;
            };

            if url.host_str().is_some_and(|h| self.is_internal(h)) {
                if let Some(no) = internal_post_number(&url) {
                    push_unique(&mut quotes, no);
                }
            } else if !links.iter().any(|l| l == candidate) {
                links.push(candidate.to_string());
            }
        }

        ParsedComment {
            text,
            quotes,
            links,
        }
    }
}

/// Strip tags, turning `<br>` and closing `</p>` into newlines, and decode entities.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => {
                let tag = &rest[start + 1..start + end];
                if is_line_break(tag) {
                    out.push('\n');
                }
                rest = &rest[start + end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    decode_html_entities(&out).into_owned()
}

/// Parse the leading digits of `s`, e.g. `123.json` or `456s.jpg`.
pub fn leading_number(s: &str) -> Option<u64> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

fn is_line_break(tag: &str) -> bool {
    let closing = tag.starts_with('/');
    let name = tag
        .trim_start_matches('/')
        .split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    name == "br" || (closing && name == "p")
}

fn collect_quote_numbers(text: &str, quotes: &mut Vec<u64>) {
    let mut rest = text;
    while let Some(pos) = rest.find(">>") {
        let after = &rest[pos + 2..];
        if let Some(no) = leading_number(after) {
            push_unique(quotes, no);
        }
        rest = after;
    }
}

/// Post number of an internal thread link: the fragment if it names a
/// post, otherwise the thread number from the path.
fn internal_post_number(url: &Url) -> Option<u64> {
    if let Some(fragment) = url.fragment() {
        if let Some(no) = leading_number(fragment.trim_start_matches('p')) {
            return Some(no);
        }
    }

    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .windows(2)
        .find(|w| w[0] == "thread" || w[0] == "res")
        .and_then(|w| leading_number(w[1]))
}

fn push_unique(quotes: &mut Vec<u64>, no: u64) {
    if !quotes.contains(&no) {
        quotes.push(no);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAN4_COMMENT: &str = concat!(
        "<a href=\"#p570368\" class=\"quotelink\">&gt;&gt;570368</a><br>",
        "<span class=\"quote\">&gt;implying</span><br>",
        "see https://exam<wbr>ple.com/page, also ",
        "https://boards.4chan.org/g/thread/570300#p570301"
    );

    const DVACH_COMMENT: &str = concat!(
        "<a href=\"/b/res/123.html#124\" class=\"post-reply-link\" ",
        "data-thread=\"123\" data-num=\"124\">&gt;&gt;124</a><br>",
        "<strong>bold</strong> text"
    );

    #[test]
    fn test_parse_chan4_comment() {
        let parser = CommentParser::with_internal_domains(&["boards.4chan.org"]);
        let parsed = parser.parse(CHAN4_COMMENT);

        assert_eq!(
            parsed.text,
            ">>570368\n>implying\nsee https://example.com/page, also https://boards.4chan.org/g/thread/570300#p570301"
        );
        assert_eq!(parsed.quotes, vec![570368, 570301]);
        assert_eq!(parsed.links, vec!["https://example.com/page".to_string()]);
    }

    #[test]
    fn test_parse_dvach_comment() {
        let parsed = CommentParser::new().parse(DVACH_COMMENT);

        assert_eq!(parsed.text, ">>124\nbold text");
        assert_eq!(parsed.quotes, vec![124]);
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn test_external_link_without_internal_domains() {
        let parsed = CommentParser::new().parse("https://boards.4chan.org/g/thread/1");
        assert!(parsed.quotes.is_empty());
        assert_eq!(parsed.links.len(), 1);
    }

    #[test]
    fn test_cross_board_quote_is_not_a_post_quote() {
        let parsed = CommentParser::new().parse("&gt;&gt;&gt;/g/");
        assert!(parsed.quotes.is_empty());
    }

    #[test]
    fn test_duplicate_quotes_collapsed() {
        let parsed = CommentParser::new().parse("&gt;&gt;5 &gt;&gt;6 &gt;&gt;5");
        assert_eq!(parsed.quotes, vec![5, 6]);
    }

    #[test]
    fn test_html_to_text_unterminated_tag() {
        assert_eq!(html_to_text("a <b"), "a <b");
        assert_eq!(html_to_text("<p>one</p><p>two</p>"), "one\ntwo\n");
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("123.json"), Some(123));
        assert_eq!(leading_number("p45"), None);
        assert_eq!(leading_number(""), None);
    }
}
