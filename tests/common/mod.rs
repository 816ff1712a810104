//! Helpers shared by the integration tests

#![allow(dead_code)]

use rv32mcu::elf_image::ElfImage;
use rv32mcu::microcontroller::{Microcontroller, MicrocontrollerConfig};

/// Little-endian bytes of a sequence of instruction words
pub fn program_bytes(program: &[u32]) -> Vec<u8> {
    program.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Assemble a little-endian RV32 executable with one PT_LOAD
/// segment per (address, contents) pair
pub fn build_elf(entry: u32, segments: &[(u32, Vec<u8>)]) -> Vec<u8> {
    const EHDR_SIZE: u32 = 52;
    const PHDR_SIZE: u32 = 32;

    let mut out = vec![0x7f, b'E', b'L', b'F', 1, 1, 1];
    out.resize(16, 0);
    out.extend(2u16.to_le_bytes()); // ET_EXEC
    out.extend(0xf3u16.to_le_bytes()); // EM_RISCV
    out.extend(1u32.to_le_bytes());
    out.extend(entry.to_le_bytes());
    out.extend(EHDR_SIZE.to_le_bytes()); // e_phoff
    out.extend(0u32.to_le_bytes()); // e_shoff
    out.extend(0u32.to_le_bytes()); // e_flags
    out.extend((EHDR_SIZE as u16).to_le_bytes());
    out.extend((PHDR_SIZE as u16).to_le_bytes());
    out.extend((segments.len() as u16).to_le_bytes());
    out.extend(40u16.to_le_bytes());
    out.extend(0u16.to_le_bytes());
    out.extend(0u16.to_le_bytes());

    let mut offset = EHDR_SIZE + PHDR_SIZE * segments.len() as u32;
    for (address, contents) in segments {
        let size = contents.len() as u32;
        for field in [1, offset, *address, *address, size, size, 0b111, 4] {
            out.extend(field.to_le_bytes());
        }
        offset += size;
    }
    for (_, contents) in segments {
        out.extend(contents);
    }
    out
}

/// A microcontroller with the image loaded and reset
pub fn boot(config: MicrocontrollerConfig, elf: &[u8]) -> Microcontroller {
    let image = ElfImage::from_bytes(elf).unwrap();
    let mut mcu = Microcontroller::new(config).unwrap();
    mcu.load_elf(&image).unwrap();
    mcu.reset();
    mcu
}
