#![forbid(unsafe_code)]

pub mod bus;
pub mod decode;
pub mod elf_image;
pub mod encode;
pub mod hart;
pub mod instr_type;
pub mod microcontroller;
pub mod opcodes;
pub mod peripherals;
pub mod utils;
