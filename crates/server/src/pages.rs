//! Landing page rendering
//!
//! One self-contained page with inline style; no template engine, no
//! external assets beyond the favicon and a web font.

use chrono::{DateTime, Utc};

use tokens::utils::{display_time, pretty_size};

/// Page style, kept out of the template so the markup stays readable
const PAGE_STYLE: &str = "\
body {
    margin: 5%;
    max-width: 768px;
    background-color: #9999ff;
    font-family: 'Ubuntu', sans-serif;
}
#main {
    background-color: #6666cc;
    color: white;
    padding: 10px;
    border-radius: 15px;
}
#top {
    font-weight: bold;
}
#disclaimer {
    font-style: italic;
}
a {
    color: white;
}";

/// Render the landing page for one token.
///
/// `valid_until` is only present once the token has been activated; a
/// fresh token shows no deadline because its countdown has not started.
pub fn landing_page(
    name: &str,
    size: u64,
    valid_until: Option<DateTime<Utc>>,
    token: &str,
) -> String {
    let validity_row = match valid_until {
        Some(deadline) => format!("<dt>Valid until</dt><dd>{}</dd>", display_time(deadline)),
        None => String::new(),
    };
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<link href='https://fonts.googleapis.com/css?family=Ubuntu' rel='stylesheet' type='text/css'>
<style type="text/css">
{style}
</style>
<meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
<title>
Download
</title>
</head>
<body>
    <div id="main">
    <p id="top">A file is ready to be retrieved:</p>
    <dl>
        <dt>Name</dt>
        <dd>{name}</dd>
        <dt>Size</dt>
        <dd>{size} bytes</dd>
        {validity}
        <dt>Link</dt>
        <dd><a href="/d/{token}">Click here to start downloading</a></dd>
    </dl>
    </div>
    <p id="disclaimer">
    This link is only valid once. It will remain valid up to four hours
    after it has first been clicked.
    </p>
</body>
</html>"#,
        style = PAGE_STYLE,
        name = escape_html(name),
        size = pretty_size(size),
        validity = validity_row,
        token = token,
    )
}

/// Minimal escaping for file names dropped into the page
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_landing_page_fresh_token() {
        let page = landing_page("report.pdf", 10_000_000, None, "ab12cd34");
        assert!(page.contains("<dd>report.pdf</dd>"));
        assert!(page.contains("<dd>10,000,000 bytes</dd>"));
        assert!(page.contains(r#"<a href="/d/ab12cd34">"#));
        assert!(!page.contains("Valid until"));
    }

    #[test]
    fn test_landing_page_activated_token() {
        let deadline = Utc.with_ymd_and_hms(2024, 3, 9, 21, 5, 42).unwrap();
        let page = landing_page("report.pdf", 42, Some(deadline), "ab12cd34");
        assert!(page.contains("<dt>Valid until</dt><dd>2024-03-09 21:05:42 UTC</dd>"));
    }

    #[test]
    fn test_file_names_are_escaped() {
        let page = landing_page("a<b>&\"c\".bin", 1, None, "ab12cd34");
        assert!(page.contains("a&lt;b&gt;&amp;&quot;c&quot;.bin"));
        assert!(!page.contains("<b>"));
    }
}
