use std::io::{self, Write};

use anyhow::Result;

use crate::citation::QueryResult;
use crate::util::print_json;

pub(super) fn write_json_response(result: &QueryResult) -> Result<()> {
    print_json(result)
}

pub(super) fn write_html_response(result: &QueryResult) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "{}", result.html_response_with_tooltips)?;
    output.flush()?;
    Ok(())
}

pub(super) fn write_text_response(result: &QueryResult, show_context: bool) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    render_text_response(&mut output, result, show_context)?;
    output.flush()?;
    Ok(())
}

pub(super) fn render_text_response<W: Write>(
    output: &mut W,
    result: &QueryResult,
    show_context: bool,
) -> Result<()> {
    writeln!(output, "{}", result.formatted_response.trim_end())?;

    if !result.locations.is_empty() {
        writeln!(output)?;
        writeln!(output, "Locations:")?;
        for (citation, location) in result.citations.iter().zip(&result.locations) {
            let path = location
                .absolute_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(unknown document)".to_string());
            writeln!(
                output,
                "[Source {}]\t{}\tpage {} paragraph {}\t{}",
                citation.new_source_num,
                path,
                location.page,
                location.paragraph,
                if location.exists { "available" } else { "missing" }
            )?;
        }
    }

    if show_context {
        writeln!(output)?;
        writeln!(output, "Citation details:")?;
        for citation in &result.citations {
            writeln!(
                output,
                "\n[Source {}] (retrieved as Source {}, id {}, relevance {})",
                citation.new_source_num,
                citation.original_source_num,
                citation.source_id,
                citation
                    .relevance_score
                    .map(|score| format!("{score:.3}"))
                    .unwrap_or_else(|| "n/a".to_string())
            )?;
            writeln!(output, "{}", citation.content)?;
        }

        writeln!(output)?;
        writeln!(output, "Context:")?;
        writeln!(output, "{}", result.context_used)?;
    }

    Ok(())
}
