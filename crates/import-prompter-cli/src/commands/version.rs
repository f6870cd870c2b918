use import_prompter_core::VERSION;
use miette::Result;

pub fn run() -> Result<()> {
    println!("import-prompter {VERSION}");
    Ok(())
}
