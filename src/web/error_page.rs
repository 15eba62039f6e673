//! HTML error page shown to browsers on non-API paths.

use askama::Template;

/// Renders `templates/error.html`.
#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage<'a> {
    pub title: &'a str,
    pub message: &'a str,
    pub status: u16,
}

impl ErrorPage<'_> {
    /// Renders the page, degrading to a bare document if the template fails.
    pub fn to_html(&self) -> String {
        self.render().unwrap_or_else(|e| {
            tracing::error!("Failed to render error page: {e}");
            format!("<!DOCTYPE html><title>{}</title><p>{}</p>", self.title, self.status)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_escaped() {
        let html = ErrorPage {
            title: "Something went wrong!",
            message: "<script>x</script>",
            status: 404,
        }
        .to_html();

        assert!(html.contains("Something went wrong!"));
        assert!(!html.contains("<script>x</script>"));
        assert!(html.contains("404"));
    }
}
