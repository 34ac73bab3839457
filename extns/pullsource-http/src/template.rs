//! `${offset.<name>}` placeholders in the request url, params, headers and body.
//!
//! A placeholder resolves to the named offset property. `offsetIndex` resolves to the sequence
//! counter. Unknown names resolve to an empty string, unterminated placeholders are kept as is.

use std::borrow::Cow;

use pullsource_core::Offset;

const OPEN: &str = "${offset.";
const CLOSE: char = '}';

/// Values are inserted as is. Used for params (encoded by the client), headers and body.
pub fn render(template: &str, offset: &Offset) -> String {
    render_with(template, offset, |value| Cow::Borrowed(value))
}

/// Values are percent-encoded, the template itself is kept, so it can carry the url structure.
pub fn render_url(template: &str, offset: &Offset) -> String {
    render_with(template, offset, urlencoding::encode)
}

fn render_with(template: &str, offset: &Offset, encode: impl Fn(&str) -> Cow<'_, str>) -> String {
    let values = offset.to_map();
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((literal, tail)) = rest.split_once(OPEN) {
        rendered.push_str(literal);

        let Some((name, after)) = tail.split_once(CLOSE) else {
            rendered.push_str(OPEN);
            rendered.push_str(tail);
            return rendered;
        };
        if let Some(value) = values.get(name.trim()) {
            rendered.push_str(&encode(&value.to_string()));
        }
        rest = after;
    }

    rendered.push_str(rest);
    rendered
}
