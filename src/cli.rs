use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zipdoc")]
#[command(version)]
#[command(about = "Render a ZIP based document as diffable text", long_about = None)]
#[command(override_usage = "zipdoc <FILE> > text_representation.txt")]
#[command(after_help = "Examples:\n  \
  zipdoc report.docx > report.txt        write the transcript of report.docx\n  \
  git config diff.zip.textconv zipdoc    diff ZIP based documents as text")]
pub struct Cli {
    /// ZIP archive to convert
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}
