//! # Hack Assembler
//!
//! This crate translates Hack assembly language into 16-bit binary
//! machine code, emitting one line of sixteen `0`/`1` characters per
//! instruction.
//!
//! # Example
//!
//! ```no_run
//! use hackasm::assemble;
//!
//! assemble("program.asm", "program.hack")?;
//! # Ok::<(), hackasm::AssemblyError>(())
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs::{read_to_string, File};
use std::io::Write;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Starting address for variable allocation in RAM
const VAR_START_ADDRESS: u16 = 16;

/// Screen memory map address
const SCREEN_ADDRESS: u16 = 16384;

/// Keyboard memory map address
const KBD_ADDRESS: u16 = 24576;

/// Largest address an A-instruction can hold (15 bits)
const MAX_ADDRESS: u16 = 0x7fff;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Assemble a .asm file to a .hack file
///
/// # Arguments
/// * `input_path` - Path to the input assembly file
/// * `output_path` - Path where the binary output will be written
///
/// # Errors
/// Returns `AssemblyError` if file I/O fails or assembly fails
///
/// # Example
/// ```no_run
/// use hackasm::assemble;
///
/// assemble("program.asm", "program.hack")?;
/// # Ok::<(), hackasm::AssemblyError>(())
/// ```
pub fn assemble(input_path: &str, output_path: &str) -> Result<(), AssemblyError> {
    let content = read_to_string(input_path).map_err(AssemblyError::FileIo)?;

    let machine_code = assemble_string(&content)?;
    write_object_file(output_path, &machine_code)?;

    Ok(())
}

/// Assemble source code string to binary output
///
/// # Arguments
/// * `content` - The assembly source code as a string
///
/// # Returns
/// A vector of binary strings, one per instruction
///
/// # Errors
/// Returns `AssemblyError` if assembly fails
///
/// # Example
/// ```
/// use hackasm::assemble_string;
///
/// let source = "@42\nD=M\n";
/// let binary = assemble_string(source)?;
/// assert_eq!(binary[0], "0000000000101010");
/// # Ok::<(), hackasm::AssemblyError>(())
/// ```
pub fn assemble_string(content: &str) -> Result<Vec<String>, AssemblyError> {
    let (commands, symbol_table) = first_pass(content)?;
    second_pass(&commands, symbol_table)
}

// ============================================================================
// FIRST PASS: Parse source and bind labels
// ============================================================================

/// First pass: parse the whole source once.
///
/// Labels are bound in the symbol table to the index of the instruction
/// that follows them. A- and C-instructions are collected, in program
/// order, for the second pass; labels are zero-width and not retained.
fn first_pass(content: &str) -> Result<(Vec<Command>, SymbolTable), AssemblyError> {
    let mut parser = Parser::new(content);
    let mut symbol_table = SymbolTable::new();
    let mut commands = Vec::new();

    while parser.advance()? {
        match parser.command() {
            Some(Command::Label(symbol)) => {
                symbol_table.add_entry(symbol, parser.line_number())?;
            }
            Some(command) => commands.push(command.clone()),
            None => break,
        }
    }

    Ok((commands, symbol_table))
}

// ============================================================================
// SECOND PASS: Generate binary code
// ============================================================================

/// Second pass: translate each collected instruction to binary,
/// resolving symbols and allocating variables as needed.
fn second_pass(
    commands: &[Command],
    mut symbol_table: SymbolTable,
) -> Result<Vec<String>, AssemblyError> {
    let mut machine_code = Vec::with_capacity(commands.len());
    let mut next_variable: u16 = VAR_START_ADDRESS;

    for command in commands {
        let binary = match command {
            Command::A(symbol) => {
                let address = resolve_address(symbol, &mut symbol_table, &mut next_variable)?;
                format!("{:016b}", address)
            }
            Command::C { dest, comp, jump } => encode_c_instruction(dest, comp, jump)?,
            // zero-width, nothing to emit
            Command::Label(_) => continue,
        };
        machine_code.push(binary);
    }

    Ok(machine_code)
}

// ============================================================================
// A-INSTRUCTION RESOLUTION
// ============================================================================

/// Resolve an A-instruction payload to an address
///
/// Tries, in order:
/// 1. A decimal literal (must fit in 15 bits)
/// 2. A symbol table lookup (predefined symbols, labels, known variables)
/// 3. Allocation of a new variable at the next free data address
fn resolve_address(
    symbol: &str,
    symbol_table: &mut SymbolTable,
    next_variable: &mut u16,
) -> Result<u16, AssemblyError> {
    if symbol.bytes().all(|b| b.is_ascii_digit()) {
        return symbol
            .parse::<u16>()
            .ok()
            .filter(|address| *address <= MAX_ADDRESS)
            .ok_or_else(|| AssemblyError::AddressOutOfRange(symbol.to_string()));
    }

    if symbol_table.contains(symbol) {
        return symbol_table.get_address(symbol);
    }

    if *next_variable > MAX_ADDRESS {
        return Err(AssemblyError::AddressOutOfRange(symbol.to_string()));
    }

    let address = *next_variable;
    symbol_table.add_entry(symbol, address)?;
    *next_variable += 1;

    Ok(address)
}

// ============================================================================
// SYMBOL TABLE
// ============================================================================

/// Maps symbolic labels and variables to their numeric addresses.
///
/// The table is pre-seeded with the predefined Hack symbols and only
/// grows: entries are never updated or removed, and inserting a name
/// twice is an error.
pub struct SymbolTable {
    symbols: HashMap<String, u16>,
}

impl SymbolTable {
    /// Create a table holding the predefined symbols: `SP`, `LCL`,
    /// `ARG`, `THIS`, `THAT`, `SCREEN`, `KBD` and `R0`..`R15`.
    pub fn new() -> Self {
        let mut table = SymbolTable {
            symbols: HashMap::new(),
        };
        table.seed_predefined();
        table
    }

    fn seed_predefined(&mut self) {
        // Virtual registers R0-R15
        for i in 0..=15 {
            self.symbols.insert(format!("R{}", i), i);
        }

        // Pointer symbols
        self.symbols.insert("SP".to_string(), 0);
        self.symbols.insert("LCL".to_string(), 1);
        self.symbols.insert("ARG".to_string(), 2);
        self.symbols.insert("THIS".to_string(), 3);
        self.symbols.insert("THAT".to_string(), 4);

        // I/O pointers
        self.symbols.insert("SCREEN".to_string(), SCREEN_ADDRESS);
        self.symbols.insert("KBD".to_string(), KBD_ADDRESS);
    }

    /// Add the pair (symbol, address) to the table.
    ///
    /// # Errors
    /// Fails if the symbol is already present (predefined symbols
    /// included) or does not match the identifier grammar.
    pub fn add_entry(&mut self, symbol: &str, address: u16) -> Result<(), AssemblyError> {
        if !is_valid_symbol(symbol) {
            return Err(AssemblyError::InvalidSymbol(symbol.to_string()));
        }
        if self.symbols.contains_key(symbol) {
            return Err(AssemblyError::DuplicateSymbol(symbol.to_string()));
        }

        self.symbols.insert(symbol.to_string(), address);
        Ok(())
    }

    /// Whether the table contains the given symbol.
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    /// Address bound to the symbol.
    ///
    /// # Errors
    /// Fails if the symbol is not in the table.
    pub fn get_address(&self, symbol: &str) -> Result<u16, AssemblyError> {
        self.symbols
            .get(symbol)
            .copied()
            .ok_or_else(|| AssemblyError::SymbolNotFound(symbol.to_string()))
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '$' | ':')
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | ':')
}

/// Identifier grammar: `[A-Za-z_.$:][A-Za-z0-9_.$:]*`
fn is_valid_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    chars.next().map_or(false, is_symbol_start) && chars.all(is_symbol_char)
}

// ============================================================================
// COMMANDS
// ============================================================================

/// The three Hack command types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    /// `@value`: load an address into the A register
    A,
    /// `dest=comp;jump`: compute, store, jump
    C,
    /// `(LABEL)`: zero-width label declaration
    L,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommandType::A => write!(f, "A"),
            CommandType::C => write!(f, "C"),
            CommandType::L => write!(f, "L"),
        }
    }
}

/// One significant source line, classified and with its fields sliced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `@value` where value is a decimal literal or a symbol
    A(String),
    /// `dest=comp;jump`; `dest` and `jump` are empty when absent
    C {
        dest: String,
        comp: String,
        jump: String,
    },
    /// `(LABEL)` declaration
    Label(String),
}

impl Command {
    /// Classify this command. Repeatable, no side effects.
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::A(_) => CommandType::A,
            Command::C { .. } => CommandType::C,
            Command::Label(_) => CommandType::L,
        }
    }

    /// Symbol of an A-instruction or label.
    ///
    /// # Errors
    /// Fails when called on a C-instruction.
    pub fn symbol(&self) -> Result<&str, AssemblyError> {
        match self {
            Command::A(symbol) | Command::Label(symbol) => Ok(symbol),
            Command::C { .. } => Err(self.field_error("symbol")),
        }
    }

    /// Destination mnemonic of a C-instruction, empty if absent.
    ///
    /// # Errors
    /// Fails when called on an A-instruction or label.
    pub fn dest(&self) -> Result<&str, AssemblyError> {
        match self {
            Command::C { dest, .. } => Ok(dest),
            _ => Err(self.field_error("dest")),
        }
    }

    /// Computation mnemonic of a C-instruction.
    ///
    /// # Errors
    /// Fails when called on an A-instruction or label.
    pub fn comp(&self) -> Result<&str, AssemblyError> {
        match self {
            Command::C { comp, .. } => Ok(comp),
            _ => Err(self.field_error("comp")),
        }
    }

    /// Jump mnemonic of a C-instruction, empty if absent.
    ///
    /// # Errors
    /// Fails when called on an A-instruction or label.
    pub fn jump(&self) -> Result<&str, AssemblyError> {
        match self {
            Command::C { jump, .. } => Ok(jump),
            _ => Err(self.field_error("jump")),
        }
    }

    fn field_error(&self, field: &'static str) -> AssemblyError {
        AssemblyError::FieldNotApplicable {
            field,
            command: self.command_type(),
        }
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// A forward-only line parser for Hack assembly source.
///
/// Strips comments and blank lines, classifies each significant line by
/// its leading character and slices its fields into a [`Command`]. Also
/// tracks the running instruction count that labels bind to.
pub struct Parser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: Option<Command>,
    exhausted: bool,
    instruction_count: u16,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser {
            lines: source.lines().enumerate(),
            current: None,
            exhausted: false,
            instruction_count: 0,
        }
    }

    /// Advance to the next significant line and parse it.
    ///
    /// Returns `Ok(false)` once the source is exhausted; every later
    /// call keeps returning `Ok(false)`.
    ///
    /// # Errors
    /// Fails on a line the grammar does not accept, carrying the
    /// 1-based source line number and its text.
    pub fn advance(&mut self) -> Result<bool, AssemblyError> {
        self.current = None;

        for (index, raw) in self.lines.by_ref() {
            let line = strip_comment(raw);
            if line.is_empty() {
                continue;
            }

            let command = parse_command(line).map_err(|reason| AssemblyError::InvalidSyntax {
                line: index + 1,
                content: raw.trim().to_string(),
                reason,
            })?;

            if command.command_type() != CommandType::L {
                self.instruction_count += 1;
            }
            self.current = Some(command);
            return Ok(true);
        }

        self.exhausted = true;
        Ok(false)
    }

    /// Whether the source is known to still have input. Only meaningful
    /// after at least one call to [`Parser::advance`].
    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    /// The current command, if any.
    pub fn command(&self) -> Option<&Command> {
        self.current.as_ref()
    }

    /// Number of A/C instructions seen so far; labels do not count.
    /// This is the instruction index a following label binds to.
    pub fn line_number(&self) -> u16 {
        self.instruction_count
    }
}

/// Remove a trailing `//` comment and surrounding whitespace.
fn strip_comment(line: &str) -> &str {
    line.split("//").next().unwrap_or("").trim()
}

fn parse_command(line: &str) -> Result<Command, String> {
    if let Some(rest) = line.strip_prefix('@') {
        parse_a_command(rest.trim())
    } else if line.starts_with('(') {
        parse_label(line)
    } else {
        parse_c_command(line)
    }
}

fn parse_a_command(symbol: &str) -> Result<Command, String> {
    if symbol.is_empty() {
        return Err("missing address after '@'".to_string());
    }

    let numeric = symbol.bytes().all(|b| b.is_ascii_digit());
    if !numeric && !is_valid_symbol(symbol) {
        return Err(format!("invalid symbol: '{}'", symbol));
    }

    Ok(Command::A(symbol.to_string()))
}

fn parse_label(line: &str) -> Result<Command, String> {
    let inner = line
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| format!("unterminated label: '{}'", line))?;

    let symbol = inner.trim();
    if !is_valid_symbol(symbol) {
        return Err(format!("invalid label name: '{}'", symbol));
    }

    Ok(Command::Label(symbol.to_string()))
}

fn parse_c_command(line: &str) -> Result<Command, String> {
    let (dest, rest) = match line.find('=') {
        Some(pos) => (line[..pos].trim(), line[pos + 1..].trim()),
        None => ("", line),
    };

    let (comp, jump) = match rest.find(';') {
        Some(pos) => (rest[..pos].trim(), rest[pos + 1..].trim()),
        None => (rest.trim(), ""),
    };

    // comp is mandatory and closed over a fixed mnemonic set; dest and
    // jump are checked against their tables when encoded.
    if comp_code(comp).is_err() {
        return Err(format!("invalid computation: '{}'", comp));
    }

    Ok(Command::C {
        dest: dest.to_string(),
        comp: comp.to_string(),
        jump: jump.to_string(),
    })
}

// ============================================================================
// CODE TRANSLATOR
// ============================================================================

/// Encode a C-instruction to binary
///
/// C-instructions have the format `111 acccccc ddd jjj` where
/// `acccccc` selects the computation, `ddd` the destination registers
/// and `jjj` the jump condition.
fn encode_c_instruction(dest: &str, comp: &str, jump: &str) -> Result<String, AssemblyError> {
    if dest.is_empty() && jump.is_empty() {
        return Err(AssemblyError::NoDestOrJump(comp.to_string()));
    }

    let comp_bits = comp_code(comp)?;
    let dest_bits = dest_code(dest)?;
    let jump_bits = jump_code(jump)?;

    Ok(format!("111{}{}{}", comp_bits, dest_bits, jump_bits))
}

/// Binary code of a comp mnemonic: the `a` selector bit followed by the
/// six ALU function bits.
pub fn comp_code(comp: &str) -> Result<&'static str, AssemblyError> {
    match comp {
        // a=0: computations over the A register
        "0" => Ok("0101010"),
        "1" => Ok("0111111"),
        "-1" => Ok("0111010"),
        "D" => Ok("0001100"),
        "A" => Ok("0110000"),
        "!D" => Ok("0001101"),
        "!A" => Ok("0110001"),
        "-D" => Ok("0001111"),
        "-A" => Ok("0110011"),
        "D+1" => Ok("0011111"),
        "A+1" => Ok("0110111"),
        "D-1" => Ok("0001110"),
        "A-1" => Ok("0110010"),
        "D+A" => Ok("0000010"),
        "D-A" => Ok("0010011"),
        "A-D" => Ok("0000111"),
        "D&A" => Ok("0000000"),
        "D|A" => Ok("0010101"),

        // a=1: the same functions over M = RAM[A]
        "M" => Ok("1110000"),
        "!M" => Ok("1110001"),
        "-M" => Ok("1110011"),
        "M+1" => Ok("1110111"),
        "M-1" => Ok("1110010"),
        "D+M" => Ok("1000010"),
        "D-M" => Ok("1010011"),
        "M-D" => Ok("1000111"),
        "D&M" => Ok("1000000"),
        "D|M" => Ok("1010101"),

        _ => Err(AssemblyError::InvalidComputation(comp.to_string())),
    }
}

/// Binary code of a dest mnemonic.
pub fn dest_code(dest: &str) -> Result<&'static str, AssemblyError> {
    match dest {
        "" => Ok("000"),
        "M" => Ok("001"),
        "D" => Ok("010"),
        "MD" => Ok("011"),
        "A" => Ok("100"),
        "AM" => Ok("101"),
        "AD" => Ok("110"),
        "AMD" => Ok("111"),
        _ => Err(AssemblyError::InvalidDestination(dest.to_string())),
    }
}

/// Binary code of a jump mnemonic.
pub fn jump_code(jump: &str) -> Result<&'static str, AssemblyError> {
    match jump {
        "" => Ok("000"),
        "JGT" => Ok("001"),
        "JEQ" => Ok("010"),
        "JGE" => Ok("011"),
        "JLT" => Ok("100"),
        "JNE" => Ok("101"),
        "JLE" => Ok("110"),
        "JMP" => Ok("111"),
        _ => Err(AssemblyError::InvalidJump(jump.to_string())),
    }
}

// ============================================================================
// UTILITIES
// ============================================================================

/// Write the machine code to disk, one binary line per instruction.
fn write_object_file(output_path: &str, machine_code: &[String]) -> Result<(), AssemblyError> {
    let mut file = File::create(output_path).map_err(AssemblyError::FileIo)?;

    for line in machine_code {
        writeln!(file, "{}", line).map_err(AssemblyError::FileIo)?;
    }

    Ok(())
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum AssemblyError {
    /// A source line the grammar does not accept.
    InvalidSyntax {
        line: usize,
        content: String,
        reason: String,
    },
    InvalidComputation(String),
    InvalidDestination(String),
    InvalidJump(String),
    /// Identifier outside `[A-Za-z_.$:][A-Za-z0-9_.$:]*`.
    InvalidSymbol(String),
    DuplicateSymbol(String),
    SymbolNotFound(String),
    /// A field accessor was called on the wrong command type.
    FieldNotApplicable {
        field: &'static str,
        command: CommandType,
    },
    /// A C-instruction with neither dest nor jump has no effect.
    NoDestOrJump(String),
    /// A-instruction value outside the 15-bit address range.
    AddressOutOfRange(String),
    FileIo(std::io::Error),
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidSyntax {
                line,
                content,
                reason,
            } => {
                write!(
                    f,
                    "Syntax error on line {}: '{}'\n  Reason: {}",
                    line, content, reason
                )
            }
            Self::InvalidComputation(comp) => {
                write!(f, "Invalid computation: '{}'\n  Valid: 0, 1, -1, D, A, M, !D, !A, !M, -D, -A, -M, D+1, A+1, M+1, D-1, A-1, M-1, D+A, D-A, A-D, D+M, D-M, M-D, D&A, D|A, D&M, D|M", comp)
            }
            Self::InvalidDestination(dest) => {
                write!(
                    f,
                    "Invalid destination: '{}'\n  Valid: M, D, MD, A, AM, AD, AMD",
                    dest
                )
            }
            Self::InvalidJump(jump) => {
                write!(
                    f,
                    "Invalid jump: '{}'\n  Valid: JGT, JEQ, JGE, JLT, JNE, JLE, JMP",
                    jump
                )
            }
            Self::InvalidSymbol(symbol) => {
                write!(
                    f,
                    "Invalid symbol: '{}'\n  Symbols start with a letter, '_', '.', '$' or ':' and may continue with digits",
                    symbol
                )
            }
            Self::DuplicateSymbol(symbol) => {
                write!(f, "Symbol already defined: '{}'", symbol)
            }
            Self::SymbolNotFound(symbol) => {
                write!(f, "Symbol not found: '{}'", symbol)
            }
            Self::FieldNotApplicable { field, command } => {
                write!(f, "'{}' is not defined for {}-commands", field, command)
            }
            Self::NoDestOrJump(comp) => {
                write!(
                    f,
                    "Instruction '{}' has neither a destination nor a jump",
                    comp
                )
            }
            Self::AddressOutOfRange(symbol) => {
                write!(
                    f,
                    "Cannot address '{}': A-instruction addresses are 15-bit (0..=32767)",
                    symbol
                )
            }
            Self::FileIo(e) => {
                write!(f, "File I/O error: {}", e)
            }
        }
    }
}

impl std::error::Error for AssemblyError {}

// ============================================================================
// UNIT TESTS
// ============================================================================
