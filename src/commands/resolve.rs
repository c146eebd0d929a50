use std::io::{self, Write};

use anyhow::Result;
use tracing::warn;

use crate::citation::{NavigationResolver, ResolvedLocation};
use crate::cli::ResolveArgs;
use crate::util::print_json;

pub fn run(args: ResolveArgs) -> Result<()> {
    let resolver = NavigationResolver::new(args.data_root.clone());
    let location = resolver.resolve(&args.identity);

    if !location.exists {
        warn!(identity = %args.identity, "document for identity is not available");
    }

    if args.json {
        return print_json(&location);
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    render_location(&mut output, &args.identity, &location)?;
    output.flush()?;
    Ok(())
}

fn render_location<W: Write>(output: &mut W, identity: &str, location: &ResolvedLocation) -> Result<()> {
    writeln!(output, "Identity: {identity}")?;
    writeln!(
        output,
        "Document: {}",
        if location.filename.is_empty() {
            "(unknown)"
        } else {
            location.filename.as_str()
        }
    )?;
    if let Some(path) = &location.absolute_path {
        writeln!(output, "Path: {}", path.display())?;
    }
    writeln!(
        output,
        "Page: {}  Paragraph: {}  Chunk: {}",
        location.page, location.paragraph, location.chunk
    )?;
    writeln!(
        output,
        "Exists: {}  Size: {} bytes",
        location.exists, location.size_bytes
    )?;
    if let Some(url) = &location.system_url {
        writeln!(output, "Open: {url}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_location_prints_defaults_for_partial_identity() {
        let location = NavigationResolver::new("data").resolve("data/rules.pdf:9");
        let mut rendered = Vec::<u8>::new();
        render_location(&mut rendered, "data/rules.pdf:9", &location).expect("render");
        let rendered = String::from_utf8(rendered).expect("utf8");

        assert!(rendered.contains("Document: rules.pdf\n"));
        assert!(rendered.contains("Page: 9  Paragraph: 1  Chunk: 1\n"));
        assert!(rendered.contains("Exists: false  Size: 0 bytes\n"));
        assert!(rendered.contains("#page=9"));
    }

    #[test]
    fn render_location_handles_unknown_document() {
        let location = NavigationResolver::new("data").resolve("");
        let mut rendered = Vec::<u8>::new();
        render_location(&mut rendered, "", &location).expect("render");
        let rendered = String::from_utf8(rendered).expect("utf8");

        assert!(rendered.contains("Document: (unknown)\n"));
        assert!(!rendered.contains("Path:"));
        assert!(!rendered.contains("Open:"));
    }
}
