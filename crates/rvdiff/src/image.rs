//! Memory images for the RTL testbench.
//!
//! The testbench loads instruction and data memory from text files holding
//! one little-endian 32-bit word per line as 8 lowercase hex digits. Section
//! contents and addresses come from the cross toolchain's `objcopy` and
//! `objdump -h`, so the ELF is never parsed here.

use std::sync::OnceLock;

use regex::Regex;

/// One row of `objdump -h` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    pub size: u32,
    pub vma: u32,
}

/// Parse the section table printed by `objdump -h`.
///
/// Rows look like `  0 .text  00000094  00100000  00100000  00001000  2**2`;
/// the flag lines that follow each row are ignored.
pub fn parse_section_headers(output: &str) -> Vec<SectionHeader> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            fields.next()?.parse::<usize>().ok()?;
            let name = fields.next()?;
            let size = u32::from_str_radix(fields.next()?, 16).ok()?;
            let vma = u32::from_str_radix(fields.next()?, 16).ok()?;
            Some(SectionHeader {
                name: name.to_string(),
                size,
                vma,
            })
        })
        .collect()
}

/// Find a section by name.
pub fn find_section<'a>(headers: &'a [SectionHeader], name: &str) -> Option<&'a SectionHeader> {
    headers.iter().find(|h| h.name == name)
}

fn instruction_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[0-9a-fA-F]+:\s+[0-9a-fA-F]{2}").unwrap())
}

/// Count the instructions `objdump -d` lists in the `.text` section.
///
/// Returns 0 when there is no `.text` disassembly.
pub fn count_text_instructions(disassembly: &str) -> usize {
    let mut in_text = false;
    let mut count = 0;
    for line in disassembly.lines() {
        if line.contains("Disassembly of section") {
            if in_text {
                break;
            }
            in_text = line.contains("section .text:");
            continue;
        }
        if in_text && instruction_line_re().is_match(line) {
            count += 1;
        }
    }
    count
}

/// Render `depth` bytes as a word-per-line hex image.
///
/// `bytes` is truncated or zero-padded to `depth`.
pub fn word_image(bytes: &[u8], depth: usize) -> String {
    let mut padded = bytes[..bytes.len().min(depth)].to_vec();
    padded.resize(depth.next_multiple_of(4), 0);

    let mut out = String::with_capacity(padded.len() / 4 * 9);
    for word in padded.chunks_exact(4) {
        let value = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        out.push_str(&format!("{value:08x}\n"));
    }
    out
}

/// Render a data memory image with `rodata` placed at `offset` bytes.
///
/// `rodata` is first truncated to `depth`; anything past `depth` after
/// placement is dropped.
pub fn data_image(rodata: &[u8], offset: usize, depth: usize) -> String {
    let mut bytes = vec![0u8; offset];
    bytes.extend_from_slice(&rodata[..rodata.len().min(depth)]);
    word_image(&bytes, depth)
}
