/// Terminate with a message on stderr and a sysexits-style code
///
/// ### Arguments
/// * `code` - The exit code to use
/// * `message` - The final message printed before exiting
pub fn with_code(code: Code, message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(code as i32);
}

/// The subset of Unix sysexits codes the CLI uses
#[derive(Debug, Copy, Clone)]
pub enum Code {
    /// Command line usage error
    Usage = 64,
    /// Input data was malformed (compilation failed)
    DataErr = 65,
    /// Cannot open the input file
    NoInput = 66,
    /// Internal error
    Software = 70,
    /// Cannot create the output file
    CantCreat = 73,
    /// Read/write failure
    IoErr = 74,
    /// Configuration (preferences) error
    Config = 78,
}
