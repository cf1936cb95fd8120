use anyhow::{Result, anyhow};
use epub_builder::{EpubBuilder, EpubContent, ReferenceType, ZipLibrary};

use crate::models::{Chapter, Work};

/// The human-readable copy kept next to each stored work.
pub fn to_markdown(work: &Work) -> String {
    let mut md = format!("# {}\n\n", work.title);
    for chapter in &work.chapters {
        md.push_str(&format!("## {}\n\n{}\n\n", chapter.title, chapter.content));
    }
    md
}

fn chapter_xhtml(chapter: &Chapter) -> String {
    let title = html_escape::encode_text(&chapter.title);
    let mut body = String::new();
    for paragraph in chapter.content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        let lines: Vec<String> = paragraph
            .lines()
            .map(|line| html_escape::encode_text(line.trim()).into_owned())
            .collect();
        body.push_str(&format!("<p>{}</p>\n", lines.join("<br/>")));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{title}</title></head>
<body>
<h2>{title}</h2>
{body}</body>
</html>
"#
    )
}

pub fn to_epub(work: &Work) -> Result<Vec<u8>> {
    let zip = ZipLibrary::new().map_err(|e| anyhow!("creating epub archive: {e}"))?;
    let mut builder = EpubBuilder::new(zip).map_err(|e| anyhow!("creating epub builder: {e}"))?;
    builder
        .metadata("title", work.title.as_str())
        .map_err(|e| anyhow!("setting epub title: {e}"))?;
    builder.inline_toc();

    for (i, chapter) in work.chapters.iter().enumerate() {
        let xhtml = chapter_xhtml(chapter);
        builder
            .add_content(
                EpubContent::new(format!("chapter_{}.xhtml", i + 1), xhtml.as_bytes())
                    .title(chapter.title.as_str())
                    .reftype(ReferenceType::Text),
            )
            .map_err(|e| anyhow!("adding chapter {}: {e}", i + 1))?;
    }

    let mut out = Vec::new();
    builder
        .generate(&mut out)
        .map_err(|e| anyhow!("writing epub: {e}"))?;
    Ok(out)
}
