//! Batch artifact output - self-contained HTML page or JSON
//!
//! The HTML page needs no server: activating an entry's link marks that
//! entry as handled in the page itself. Nothing about "handled" is stored.

use crate::services::composer::Artifact;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PAGE_STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto}\
li{list-style:none;border:1px solid #ccc;border-radius:6px;padding:.75rem;margin:.5rem 0}\
li.handled{opacity:.45;background:#e8f5e9}\
li.handled .status::after{content:' ✓'}\
pre{white-space:pre-wrap;font-family:inherit}";

const PAGE_SCRIPT: &str = "document.querySelectorAll('a.send').forEach(function(a){\
a.addEventListener('click',function(){a.closest('li').classList.add('handled');});});";

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Render the artifact as a standalone HTML document
pub fn render_html(artifact: &Artifact, title: &str) -> String {
    let mut html = String::with_capacity(1024 + artifact.entries.len() * 512);
    html.push_str("<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str(&format!("<style>{PAGE_STYLE}</style>\n</head>\n<body>\n"));
    html.push_str(&format!(
        "<h1>{}</h1>\n<p>{} | {} mensagens | {} sem contato</p>\n<ul>\n",
        escape_html(title),
        artifact.generated_on.format("%d/%m/%Y"),
        artifact.entries.len(),
        artifact.skipped.len()
    ));

    for entry in &artifact.entries {
        html.push_str(&format!(
            "<li id=\"entry-{cn}\"><strong>{name}</strong> <span class=\"status\">#{cn}</span>\n\
             <pre>{message}</pre>\n\
             <a class=\"send\" href=\"{link}\" target=\"_blank\" rel=\"noopener\">Enviar para +{phone}</a></li>\n",
            cn = entry.control_number,
            name = escape_html(&entry.recipient_name),
            message = escape_html(&entry.message),
            link = escape_html(&entry.link),
            phone = escape_html(&entry.phone),
        ));
    }

    html.push_str("</ul>\n");
    html.push_str(&format!("<script>{PAGE_SCRIPT}</script>\n</body>\n</html>\n"));
    html
}

/// Writes artifacts into an output directory
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self { output_dir: output_dir.as_ref().to_path_buf() }
    }

    fn ensure_dir(&self) -> std::io::Result<()> {
        if !self.output_dir.exists() {
            fs::create_dir_all(&self.output_dir)?;
        }
        Ok(())
    }

    /// Write the HTML page; returns the file path
    pub fn write_html(&self, artifact: &Artifact, title: &str) -> std::io::Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.output_dir.join(format!("notifications-{}.html", artifact.generated_on));
        let html = render_html(artifact, title);
        fs::write(&path, &html)?;
        info!(
            file = %path.display(),
            entries = %artifact.entries.len(),
            bytes = %html.len(),
            "artifact_written"
        );
        Ok(path)
    }

    /// Write the artifact as pretty JSON; returns the file path
    pub fn write_json(&self, artifact: &Artifact) -> std::io::Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.output_dir.join(format!("notifications-{}.json", artifact.generated_on));
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(&path, json)?;
        debug!(file = %path.display(), "artifact_json_written");
        Ok(path)
    }
}
