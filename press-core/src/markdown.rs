use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd, html};
use regex::{Captures, Regex};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

// Initialize syntax highlighting resources once
static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

const CODE_THEME: &str = "base16-ocean.dark";

static DISPLAY_MATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<span class="math math-display">[^<]*</span>"#).expect("display math pattern is valid")
});

static PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p>(.*?)</p>").expect("paragraph pattern is valid"));

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_MATH
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_FOOTNOTES
}

/// Convert a markdown document into an HTML fragment.
///
/// Fenced code blocks are highlighted server side; display math ends up
/// inside `<div class="math-block">` so it can be styled as a block.
pub fn render_markdown(content: &str) -> String {
    let events: Vec<Event> = Parser::new_ext(content, options()).collect();
    let mut processed_events = Vec::with_capacity(events.len());
    let mut i = 0;

    while i < events.len() {
        match &events[i] {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(lang))) => {
                // Collect all text events until the end of the code block
                let mut code = String::new();
                i += 1;
                while i < events.len() {
                    match &events[i] {
                        Event::End(TagEnd::CodeBlock) => break,
                        Event::Text(text) => code.push_str(text),
                        _ => {}
                    }
                    i += 1;
                }

                // Info strings can carry extra words ("rust ignore")
                let lang = lang.split_whitespace().next().unwrap_or_default();
                processed_events.push(Event::Html(highlight_code(lang, &code).into()));
            }
            event => processed_events.push(event.clone()),
        }
        i += 1;
    }

    let mut out = String::new();
    html::push_html(&mut out, processed_events.into_iter());

    wrap_display_math(&out)
}

/// Lift every display-math span out of its paragraph into a
/// `<div class="math-block">`. Text around the span stays in paragraphs of
/// its own; a paragraph holding only math disappears.
pub fn wrap_display_math(html: &str) -> String {
    PARAGRAPH
        .replace_all(html, |caps: &Captures| {
            let body = &caps[1];
            if !DISPLAY_MATH.is_match(body) {
                return caps[0].to_string();
            }

            let mut out = String::with_capacity(body.len() + 64);
            let mut last = 0;
            for math in DISPLAY_MATH.find_iter(body) {
                push_paragraph(&mut out, &body[last..math.start()]);
                out.push_str(r#"<div class="math-block">"#);
                out.push_str(math.as_str());
                out.push_str("</div>");
                last = math.end();
            }
            push_paragraph(&mut out, &body[last..]);
            out
        })
        .into_owned()
}

fn push_paragraph(out: &mut String, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        out.push_str("<p>");
        out.push_str(text);
        out.push_str("</p>");
    }
}

fn highlight_code(lang: &str, code: &str) -> String {
    let plain = || {
        if lang.is_empty() {
            format!("<pre><code>{}</code></pre>\n", html_escape::encode_text(code))
        } else {
            format!(
                "<pre><code class=\"language-{}\">{}</code></pre>\n",
                html_escape::encode_double_quoted_attribute(lang),
                html_escape::encode_text(code)
            )
        }
    };

    if lang.is_empty() {
        return plain();
    }

    let syntax = SYNTAX_SET.find_syntax_by_token(lang).or_else(|| {
        // Fallback mappings for unsupported languages
        match lang {
            "toml" => SYNTAX_SET.find_syntax_by_name("YAML"),
            "jsx" | "ts" | "typescript" => SYNTAX_SET.find_syntax_by_name("JavaScript"),
            _ => None,
        }
    });

    match syntax {
        Some(syntax) => {
            let theme = &THEME_SET.themes[CODE_THEME];
            highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme).unwrap_or_else(|_| plain())
        }
        None => plain(),
    }
}

/// Text of the first level-one heading, if any.
pub fn first_heading(content: &str) -> Option<String> {
    let mut in_heading = false;
    let mut text = String::new();

    for event in Parser::new_ext(content, options()) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => in_heading = true,
            Event::End(TagEnd::Heading(HeadingLevel::H1)) if in_heading => {
                return Some(text.trim().to_string());
            }
            Event::Text(t) | Event::Code(t) if in_heading => text.push_str(&t),
            _ => {}
        }
    }

    None
}
