//! SSML document assembly.
//!
//! The body is built as a list of [`Fragment`]s and escaped on render, so
//! any input text yields a well-formed document with a single `<speak>`
//! root holding a single `<voice>`.

use super::profile::Prosody;
use super::strategy::EmphasisLevel;

const SSML_NS: &str = "http://www.w3.org/2001/10/synthesis";
const MSTTS_NS: &str = "https://www.w3.org/2001/mstts";

/// Voice used when neither the profile nor the caller names one.
pub const FALLBACK_VOICE: &str = "en-US-JennyNeural";

/// One piece of the utterance body.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Raw text, escaped on render.
    Text(String),
    /// A pause in milliseconds.
    Break(u32),
    /// Emphasised text.
    Emphasis(EmphasisLevel, String),
}

/// Escape the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Not allowed in XML 1.0.
            '\u{FFFE}' | '\u{FFFF}' => out.push(' '),
            c if c.is_control() && !matches!(c, '\t' | '\n' | '\r') => out.push(' '),
            c => out.push(c),
        }
    }
    out
}

/// An SSML document under construction.
#[derive(Debug, Clone)]
pub struct SsmlDocument {
    locale: String,
    voice: String,
    express: Option<(String, f32)>,
    prosody: Option<Prosody>,
    body: Vec<Fragment>,
}

impl SsmlDocument {
    /// New document; a blank voice becomes [`FALLBACK_VOICE`].
    pub fn new(voice: &str, locale: &str) -> Self {
        let voice = voice.trim();
        let locale = locale.trim();
        Self {
            locale: if locale.is_empty() { "en-US" } else { locale }.to_owned(),
            voice: if voice.is_empty() { FALLBACK_VOICE } else { voice }.to_owned(),
            express: None,
            prosody: None,
            body: Vec::new(),
        }
    }

    /// Wrap the body in `<mstts:express-as>`; blank styles are ignored.
    pub fn express_as(mut self, style: &str, degree: f32) -> Self {
        let style = style.trim();
        if !style.is_empty() {
            let degree = if degree.is_finite() { degree.clamp(0.01, 2.0) } else { 1.0 };
            self.express = Some((style.to_owned(), degree));
        }
        self
    }

    /// Wrap the body in `<prosody>`.
    pub fn prosody(mut self, prosody: Prosody) -> Self {
        self.prosody = Some(prosody);
        self
    }

    /// Set the body.
    pub fn body(mut self, body: Vec<Fragment>) -> Self {
        self.body = body;
        self
    }

    /// Render to a string.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(256 + self.body.len() * 16);
        out.push_str(&format!(
            r#"<speak version="1.0" xmlns="{SSML_NS}" xmlns:mstts="{MSTTS_NS}" xml:lang="{}">"#,
            escape_xml(&self.locale)
        ));
        out.push_str(&format!(r#"<voice name="{}">"#, escape_xml(&self.voice)));
        if let Some((style, degree)) = &self.express {
            out.push_str(&format!(
                r#"<mstts:express-as style="{}" styledegree="{degree:.2}">"#,
                escape_xml(style)
            ));
        }
        if let Some(p) = &self.prosody {
            out.push_str(&format!(
                r#"<prosody rate="{}" pitch="{}" volume="{}">"#,
                p.rate_attr(),
                p.pitch_attr(),
                p.volume_attr()
            ));
        }
        for fragment in &self.body {
            match fragment {
                Fragment::Text(text) => out.push_str(&escape_xml(text)),
                Fragment::Break(ms) => out.push_str(&format!(r#"<break time="{ms}ms"/>"#)),
                Fragment::Emphasis(level, text) => out.push_str(&format!(
                    r#"<emphasis level="{}">{}</emphasis>"#,
                    level.as_str(),
                    escape_xml(text)
                )),
            }
        }
        if self.prosody.is_some() {
            out.push_str("</prosody>");
        }
        if self.express.is_some() {
            out.push_str("</mstts:express-as>");
        }
        out.push_str("</voice></speak>");
        out
    }
}

/// Minimal SSML wrapping plain text.
pub fn plain_ssml(text: &str, voice: &str, locale: &str) -> String {
    SsmlDocument::new(voice, locale)
        .body(vec![Fragment::Text(text.to_owned())])
        .render()
}
