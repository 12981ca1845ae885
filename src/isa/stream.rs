//! Little-endian instruction stream images.
//!
//! Firmware images store each thread's instructions as consecutive 32-bit
//! little-endian words.

use super::decode::DecodeError;
use super::encoding::Instr;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Bytes per instruction word.
pub const WORD_BYTES: usize = 4;

/// Serialise instructions into a little-endian image.
pub fn encode_stream<I>(instrs: I) -> Vec<u8>
where
    I: IntoIterator<Item = Instr>,
{
    let mut out = Vec::new();
    for instr in instrs {
        // Writing into a Vec cannot fail.
        let _ = out.write_u32::<LittleEndian>(instr.word());
    }
    out
}

/// Parse a little-endian image, rejecting unknown opcodes.
pub fn decode_stream(bytes: &[u8]) -> Result<Vec<Instr>, DecodeError> {
    if bytes.len() % WORD_BYTES != 0 {
        return Err(DecodeError::Truncated { len: bytes.len() });
    }

    let mut cursor = Cursor::new(bytes);
    let mut instrs = Vec::with_capacity(bytes.len() / WORD_BYTES);
    while let Ok(word) = cursor.read_u32::<LittleEndian>() {
        let instr = Instr::from_word(word);
        instr.decode()?;
        instrs.push(instr);
    }
    Ok(instrs)
}

/// Read the instruction at word index `index` of an image.
pub fn word_at(bytes: &[u8], index: usize) -> Option<Instr> {
    let start = index.checked_mul(WORD_BYTES)?;
    let chunk = bytes.get(start..start + WORD_BYTES)?;
    Some(Instr::from_word(LittleEndian::read_u32(chunk)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{ops, HostWait, InstructionSink, ThreadProgram};

    #[test]
    fn test_encode_is_little_endian() {
        let bytes = encode_stream([ops::setc16(48, 0x0200)]);
        assert_eq!(bytes, vec![0x00, 0x02, 0x30, 0xb2]);
    }

    #[test]
    fn test_decode_image() {
        let program = [ops::nop(), ops::sempost(2), ops::replay(0, 4, false, false)];
        let bytes = encode_stream(program);
        assert_eq!(decode_stream(&bytes).unwrap(), program.to_vec());
        assert_eq!(word_at(&bytes, 1), Some(ops::sempost(2)));
        assert_eq!(word_at(&bytes, 3), None);
    }

    #[test]
    fn test_encode_thread_program() {
        let mut program = ThreadProgram::new();
        program.host_wait(HostWait::MopIdle);
        program.issue(ops::sempost(2));
        program.issue(ops::nop());

        // Host-side ops have no word in the image.
        let bytes = encode_stream(program.instructions());
        assert_eq!(bytes.len(), 2 * WORD_BYTES);
        assert_eq!(word_at(&bytes, 0), Some(ops::sempost(2)));
    }

    #[test]
    fn test_truncated_image() {
        let err = decode_stream(&[0x00, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { len: 3 });
    }

    #[test]
    fn test_unknown_word_rejected() {
        let bytes = [0x00, 0x00, 0x00, 0xff];
        assert!(matches!(
            decode_stream(&bytes),
            Err(DecodeError::UnknownOpcode { opcode: 0xff, .. })
        ));
    }
}
