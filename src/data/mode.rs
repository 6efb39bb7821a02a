use std::fmt;

/// Playback mode token embedded in an archive URL after the timestamp.
///
/// The token tells the Wayback Machine how to serve a memento: the exact
/// archived bytes (`id_`), a browser-friendly rewrite with navigation
/// decorations (no token), an iframe payload (`if_`), and so on. Tokens this
/// library does not know about are preserved verbatim and round-trip through
/// formatting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Browser-friendly playback with Wayback's rewriting (empty token).
    View,
    /// The exact archived response bytes (`id_`).
    Original,
    /// Iframe payload rendering (`if_`).
    Iframe,
    /// Image playback (`im_`).
    Image,
    /// Any other token, kept exactly as it appeared.
    Other(String),
}

impl Mode {
    /// The URL token for this mode.
    pub fn token(&self) -> &str {
        match self {
            Mode::View => "",
            Mode::Original => "id_",
            Mode::Iframe => "if_",
            Mode::Image => "im_",
            Mode::Other(token) => token,
        }
    }

    /// Interpret a URL token as a playback mode.
    pub fn from_token(token: &str) -> Mode {
        match token {
            "" => Mode::View,
            "id_" => Mode::Original,
            "if_" => Mode::Iframe,
            "im_" => Mode::Image,
            other => Mode::Other(other.to_string()),
        }
    }
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Original
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
