// src/utils/html.rs

/// Sanitizes author-supplied rich text (question text, options, explanations).
///
/// Whitelist-based: formatting tags such as <b>, <sub>, <sup> survive, while
/// <script>, <iframe> and event-handler attributes are stripped along with
/// their content.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_formatting_drops_scripts() {
        assert_eq!(clean_html("x<sup>2</sup><script>evil()</script>"), "x<sup>2</sup>");
    }

    #[test]
    fn strips_event_handlers() {
        assert_eq!(clean_html(r#"<b onclick="steal()">bold</b>"#), "<b>bold</b>");
    }
}
