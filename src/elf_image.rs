//! ELF executable loading
//!
//! An ElfImage is the part of an ELF file the microcontroller needs:
//! the entry point and the loadable (PT_LOAD) segments, each with
//! its base address, the size it occupies in memory and the bytes
//! stored for it in the file. The rest of the segment, up to its
//! memory size, is zero; the loader fills it in place, so no buffer
//! of the memory size is ever allocated here.
//!
//! Parsing is done by the elf crate, which checks the magic bytes,
//! the class and data encoding fields, and the ident version. On
//! top of that the file must be a 32-bit RISC-V executable, and
//! every program header must have one of the standard types
//! (PT_NULL to PT_PHDR). Headers of other known types are skipped.

use std::path::Path;

use elf::abi::{EM_RISCV, ET_EXEC, EV_CURRENT, PT_LOAD, PT_PHDR};
use elf::endian::AnyEndian;
use elf::file::Class;
use elf::{ElfBytes, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ElfError {
    #[error("could not read ELF file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid ELF file: {0}")]
    Parse(#[from] ParseError),
    #[error("expected a 32-bit ELF file")]
    NotElf32,
    #[error("ELF file type {0} is not an executable")]
    NotExecutable(u16),
    #[error("ELF machine 0x{0:x} is not RISC-V")]
    NotRiscV(u16),
    #[error("unsupported ELF version {0}")]
    UnsupportedVersion(u32),
    #[error("unknown program header type 0x{0:x}")]
    UnknownSegmentType(u32),
    #[error("segment at 0x{address:08x}: file size {file_size} > memory size {memory_size}")]
    FileSizeExceedsMemorySize {
        address: u32,
        file_size: u64,
        memory_size: u64,
    },
    #[error("segment at 0x{address:08x} of {memory_size} bytes extends past the end of memory")]
    SegmentBeyondAddressSpace { address: u32, memory_size: u64 },
}

/// A loadable segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramHeader {
    pub header_type: u32,
    /// Virtual address of the first byte of data
    pub base_address: u32,
    /// p_memsz, never less than data.len()
    pub memory_size: u32,
    /// The p_filesz bytes stored in the file
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElfImage {
    pub entry_point: u32,
    /// PT_LOAD segments only, in file order
    pub program_headers: Vec<ProgramHeader>,
}

impl ElfImage {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ElfError> {
        let file_data = std::fs::read(path)?;
        Self::from_bytes(&file_data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, ElfError> {
        let file = ElfBytes::<AnyEndian>::minimal_parse(data)?;
        let ehdr = &file.ehdr;
        if ehdr.class != Class::ELF32 {
            return Err(ElfError::NotElf32);
        }
        if ehdr.e_type != ET_EXEC {
            return Err(ElfError::NotExecutable(ehdr.e_type));
        }
        if ehdr.e_machine != EM_RISCV {
            return Err(ElfError::NotRiscV(ehdr.e_machine));
        }
        if ehdr.version != u32::from(EV_CURRENT) {
            return Err(ElfError::UnsupportedVersion(ehdr.version));
        }

        // Every field of an ELF32 header fits in 32 bits
        let entry_point = ehdr.e_entry as u32;

        let mut program_headers = Vec::new();
        for phdr in file.segments().into_iter().flatten() {
            if phdr.p_type > PT_PHDR {
                return Err(ElfError::UnknownSegmentType(phdr.p_type));
            }
            let base_address = phdr.p_vaddr as u32;
            if phdr.p_type != PT_LOAD {
                log::debug!(
                    "skipping segment type {} at 0x{base_address:08x}",
                    phdr.p_type
                );
                continue;
            }
            if phdr.p_filesz > phdr.p_memsz {
                return Err(ElfError::FileSizeExceedsMemorySize {
                    address: base_address,
                    file_size: phdr.p_filesz,
                    memory_size: phdr.p_memsz,
                });
            }
            if phdr.p_vaddr + phdr.p_memsz > 1 << 32 {
                return Err(ElfError::SegmentBeyondAddressSpace {
                    address: base_address,
                    memory_size: phdr.p_memsz,
                });
            }
            program_headers.push(ProgramHeader {
                header_type: phdr.p_type,
                base_address,
                memory_size: phdr.p_memsz as u32,
                data: file.segment_data(&phdr)?.to_vec(),
            });
        }

        Ok(Self {
            entry_point,
            program_headers,
        })
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    /// Hand-assembled ELF32 file with one program header per
    /// segment and no section headers
    struct TestElf {
        big_endian: bool,
        class: u8,
        e_type: u16,
        machine: u16,
        version: u32,
        entry: u32,
        /// (p_type, p_vaddr, contents, p_memsz)
        segments: Vec<(u32, u32, Vec<u8>, u32)>,
    }

    impl Default for TestElf {
        fn default() -> Self {
            Self {
                big_endian: false,
                class: 1,
                e_type: 2,
                machine: 0xf3,
                version: 1,
                entry: 0x200,
                segments: vec![(1, 0x200, vec![0x13, 0x05, 0x15, 0x00], 4)],
            }
        }
    }

    impl TestElf {
        fn bytes(&self) -> Vec<u8> {
            let half = |v: u16| {
                if self.big_endian {
                    v.to_be_bytes()
                } else {
                    v.to_le_bytes()
                }
            };
            let word = |v: u32| {
                if self.big_endian {
                    v.to_be_bytes()
                } else {
                    v.to_le_bytes()
                }
            };
            let phoff = 52u32;
            let mut data_offset = phoff + 32 * self.segments.len() as u32;

            let mut out = vec![0x7f, b'E', b'L', b'F', self.class];
            out.push(if self.big_endian { 2 } else { 1 });
            out.push(1);
            out.resize(16, 0);
            out.extend(half(self.e_type));
            out.extend(half(self.machine));
            out.extend(word(self.version));
            out.extend(word(self.entry));
            out.extend(word(phoff));
            out.extend(word(0)); // e_shoff
            out.extend(word(0)); // e_flags
            out.extend(half(52));
            out.extend(half(32));
            out.extend(half(self.segments.len() as u16));
            out.extend(half(40));
            out.extend(half(0));
            out.extend(half(0));

            for (p_type, vaddr, contents, memsz) in &self.segments {
                out.extend(word(*p_type));
                out.extend(word(data_offset));
                out.extend(word(*vaddr));
                out.extend(word(*vaddr));
                out.extend(word(contents.len() as u32));
                out.extend(word(*memsz));
                out.extend(word(0b101));
                out.extend(word(4));
                data_offset += contents.len() as u32;
            }
            for (_, _, contents, _) in &self.segments {
                out.extend(contents);
            }
            out
        }
    }

    #[test]
    fn check_minimal_little_endian_executable() {
        let image = ElfImage::from_bytes(&TestElf::default().bytes()).unwrap();
        assert_eq!(image.entry_point, 0x200);
        assert_eq!(image.program_headers.len(), 1);
        let segment = &image.program_headers[0];
        assert_eq!(segment.header_type, 1);
        assert_eq!(segment.base_address, 0x200);
        assert_eq!(segment.data.len(), 4);
        assert_eq!(segment.data[2], 0x15);
    }

    #[test]
    fn check_big_endian_executable() {
        let elf = TestElf {
            big_endian: true,
            entry: 0x1234,
            ..Default::default()
        };
        let image = ElfImage::from_bytes(&elf.bytes()).unwrap();
        assert_eq!(image.entry_point, 0x1234);
        assert_eq!(image.program_headers[0].data, vec![0x13, 0x05, 0x15, 0x00]);
    }

    #[test]
    fn check_memory_size_kept_separate_from_file_data() {
        let elf = TestElf {
            segments: vec![(1, 0x1000_0000, vec![1, 2, 3], 8)],
            ..Default::default()
        };
        let image = ElfImage::from_bytes(&elf.bytes()).unwrap();
        assert_eq!(image.program_headers[0].data, vec![1, 2, 3]);
        assert_eq!(image.program_headers[0].memory_size, 8);
    }

    #[test]
    fn check_huge_memory_size_not_allocated() {
        let elf = TestElf {
            segments: vec![(1, 0, vec![], 0xffff_ffff)],
            ..Default::default()
        };
        let image = ElfImage::from_bytes(&elf.bytes()).unwrap();
        assert!(image.program_headers[0].data.is_empty());
        assert_eq!(image.program_headers[0].memory_size, 0xffff_ffff);
    }

    #[test]
    fn check_segment_past_end_of_address_space_rejected() {
        let elf = TestElf {
            segments: vec![(1, 0x1000_0000, vec![1, 2, 3], 0xffff_ffff)],
            ..Default::default()
        };
        let result = ElfImage::from_bytes(&elf.bytes());
        assert!(matches!(
            result,
            Err(ElfError::SegmentBeyondAddressSpace {
                address: 0x1000_0000,
                memory_size: 0xffff_ffff
            })
        ));
    }

    #[test]
    fn check_non_load_segments_skipped() {
        let elf = TestElf {
            segments: vec![
                (4, 0, vec![0xaa; 4], 4),
                (1, 0x200, vec![0xbb; 4], 4),
                (0, 0, vec![], 0),
            ],
            ..Default::default()
        };
        let image = ElfImage::from_bytes(&elf.bytes()).unwrap();
        assert_eq!(image.program_headers.len(), 1);
        assert_eq!(image.program_headers[0].data, vec![0xbb; 4]);
    }

    #[test]
    fn check_unknown_segment_type_rejected() {
        let elf = TestElf {
            segments: vec![(0x6474_e551, 0, vec![], 0)],
            ..Default::default()
        };
        let result = ElfImage::from_bytes(&elf.bytes());
        assert!(matches!(result, Err(ElfError::UnknownSegmentType(0x6474_e551))));
    }

    #[test]
    fn check_bad_magic_rejected() {
        let mut bytes = TestElf::default().bytes();
        bytes[1] = b'X';
        let result = ElfImage::from_bytes(&bytes);
        assert!(matches!(result, Err(ElfError::Parse(_))));
    }

    #[test]
    fn check_wrong_machine_rejected() {
        let elf = TestElf {
            machine: 0x28,
            ..Default::default()
        };
        let result = ElfImage::from_bytes(&elf.bytes());
        assert!(matches!(result, Err(ElfError::NotRiscV(0x28))));
    }

    #[test]
    fn check_wrong_type_rejected() {
        let elf = TestElf {
            e_type: 1,
            ..Default::default()
        };
        let result = ElfImage::from_bytes(&elf.bytes());
        assert!(matches!(result, Err(ElfError::NotExecutable(1))));
    }

    #[test]
    fn check_wrong_version_rejected() {
        let elf = TestElf {
            version: 2,
            ..Default::default()
        };
        let result = ElfImage::from_bytes(&elf.bytes());
        assert!(matches!(result, Err(ElfError::UnsupportedVersion(2))));
    }

    #[test]
    fn check_file_size_larger_than_memory_size_rejected() {
        let elf = TestElf {
            segments: vec![(1, 0x200, vec![0; 8], 4)],
            ..Default::default()
        };
        let result = ElfImage::from_bytes(&elf.bytes());
        assert!(matches!(
            result,
            Err(ElfError::FileSizeExceedsMemorySize { address: 0x200, .. })
        ));
    }

    #[test]
    fn check_missing_file() {
        let result = ElfImage::from_file("/nonexistent/program.elf");
        assert!(matches!(result, Err(ElfError::Io(_))));
    }
}
