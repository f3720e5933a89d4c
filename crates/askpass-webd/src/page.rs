//! HTML rendering of the prompt index.
//!
//! The page is deliberately plain: one form per prompt, no scripts, no
//! external resources. Everything that came from a prompt file is escaped.

use std::fmt::Write;

use askpass_web_core::PromptRegistry;

const HEAD: &str = r#"<!doctype html>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="robots" content="noindex, nofollow">
<title>Askpass</title>
<h1>Askpass</h1>
"#;

/// Render the index page listing every prompt in `registry`.
pub fn render_index(registry: &PromptRegistry) -> String {
    let mut html = String::from(HEAD);
    html.push_str("<ul>\n");

    if registry.is_empty() {
        html.push_str("\t<li>No password prompts found. Refresh to try again.</li>\n");
    }

    for (name, prompt) in registry.iter() {
        let input_type = if prompt.echo() { "text" } else { "password" };
        // Writing to a String cannot fail.
        let _ = write!(
            html,
            concat!(
                "\t<li>\n",
                "\t\t<form action=\"pass\" method=\"post\">\n",
                "\t\t\t<input type=\"hidden\" name=\"ask\" value=\"{name}\">\n",
                "\t\t\t<label>\n",
                "\t\t\t\t{message}\n",
                "\t\t\t\t<input type=\"{input_type}\" name=\"answer\" autocomplete=\"off\" autofocus>\n",
                "\t\t\t</label>\n",
                "\t\t\t<input type=\"submit\" value=\"Submit\">\n",
                "\t\t\t<button type=\"submit\" name=\"cancel\" value=\"true\">Cancel</button>\n",
            ),
            name = escape(name),
            message = escape(prompt.message()),
            input_type = input_type,
        );
        if let Some(id) = prompt.id() {
            let _ = writeln!(html, "\t\t\t<small>{}</small>", escape(id));
        }
        html.push_str("\t\t</form>\n\t</li>\n");
    }

    html.push_str("</ul>\n");
    html
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
