use crate::arena::Arena;
use crate::error::{BasicError, BasicResult};

/// A packed variable name: one required letter in the high byte, an
/// optional trailing digit in the low byte (0 if absent). Matches
/// `var_name_packed`'s `uint16_t` layout exactly so two-character BASIC
/// variable names (`A`, `A1`, ... `Z9`) compare equal by raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarName(pub u16);

impl VarName {
    pub fn empty() -> Self {
        VarName(0)
    }

    pub fn push_char(self, c: u8) -> Self {
        VarName((self.0 << 8) | c as u16)
    }
}

const SCALAR_ENTRY_SIZE: usize = 6; // name: u16 + value: f32
const ARRAY_HEADER_SIZE: usize = 4; // name: u16 + block_size: u16

/// Scan the scalar-variable region `[vars_idx, array_idx)` for `name`,
/// returning the absolute offset of its 4-byte value field.
fn lookup_var(arena: &Arena, name: VarName) -> Option<usize> {
    let mut idx = arena.vars_idx;
    while idx < arena.array_idx {
        let v0 = arena.read_u16(idx);
        if v0 == name.0 {
            return Some(idx + 2);
        }
        idx += SCALAR_ENTRY_SIZE;
    }
    None
}

/// Read a scalar's value, or `0.0` if it has never been assigned - all
/// variables read as zero until initialized, matching the reference store.
pub fn read_var(arena: &Arena, name: VarName) -> f32 {
    match lookup_var(arena, name) {
        Some(off) => arena.read_f32(off),
        None => 0.0,
    }
}

/// Look up a scalar, creating it (zero-initialized) if it doesn't exist yet.
/// Creating a variable shifts the array region up by one entry's worth of
/// space to keep the three regions contiguous and ordered.
pub fn create_scalar(arena: &mut Arena, name: VarName) -> BasicResult<usize> {
    if let Some(off) = lookup_var(arena, name) {
        return Ok(off);
    }
    arena.require_space(SCALAR_ENTRY_SIZE)?;
    if arena.array_idx != arena.free_idx {
        arena
            .buf
            .copy_within(arena.array_idx..arena.free_idx, arena.array_idx + SCALAR_ENTRY_SIZE);
    }
    let entry_idx = arena.array_idx;
    arena.write_u16(entry_idx, name.0);
    arena.write_f32(entry_idx + 2, 0.0);
    arena.array_idx += SCALAR_ENTRY_SIZE;
    arena.free_idx += SCALAR_ENTRY_SIZE;
    Ok(entry_idx + 2)
}

/// Look up or create an array element, per `variable_storage_create_array_var`.
/// `dim` distinguishes an explicit `DIM` (which fixes `subscript` as the
/// array's highest index and errors if the array already exists) from an
/// implicit reference (which auto-dimensions to 10 on first use and allows
/// any subscript up to 10).
pub fn array_element(
    arena: &mut Arena,
    name: VarName,
    subscript: u32,
    dim: bool,
) -> BasicResult<usize> {
    let mut idx = arena.array_idx;
    while idx + ARRAY_HEADER_SIZE <= arena.free_idx {
        let hdr_name = arena.read_u16(idx);
        let block_size = arena.read_u16(idx + 2) as u32;
        if hdr_name == name.0 {
            if dim {
                return Err(BasicError::Redimension);
            }
            if subscript * 4 >= block_size {
                return Err(BasicError::Subscript);
            }
            return Ok(idx + ARRAY_HEADER_SIZE + (subscript * 4) as usize);
        }
        idx += ARRAY_HEADER_SIZE + block_size as usize;
    }
    let elem_count = if dim {
        subscript
    } else if subscript > 10 {
        return Err(BasicError::Subscript);
    } else {
        10
    };
    let block_size = (elem_count + 1) * 4;
    arena.require_space(block_size as usize + ARRAY_HEADER_SIZE)?;
    let hdr_idx = arena.free_idx;
    arena.write_u16(hdr_idx, name.0);
    arena.write_u16(hdr_idx + 2, block_size as u16);
    let elems_start = hdr_idx + ARRAY_HEADER_SIZE;
    for b in &mut arena.buf[elems_start..elems_start + block_size as usize] {
        *b = 0;
    }
    arena.free_idx += block_size as usize + ARRAY_HEADER_SIZE;
    Ok(elems_start + (subscript * 4) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_scalar_reads_as_zero() {
        let arena = Arena::new(256);
        assert_eq!(read_var(&arena, VarName::empty().push_char(b'A')), 0.0);
    }

    #[test]
    fn scalar_round_trips_through_create_and_read() {
        let mut arena = Arena::new(256);
        let name = VarName::empty().push_char(b'A');
        let off = create_scalar(&mut arena, name).unwrap();
        arena.write_f32(off, 42.0);
        assert_eq!(read_var(&arena, name), 42.0);
        // Looking it up again returns the same slot, not a duplicate.
        let off2 = create_scalar(&mut arena, name).unwrap();
        assert_eq!(off, off2);
    }

    #[test]
    fn default_dimensioned_array_allows_up_to_ten() {
        let mut arena = Arena::new(256);
        let name = VarName::empty().push_char(b'B');
        assert!(array_element(&mut arena, name, 10, false).is_ok());
        assert_eq!(
            array_element(&mut arena, name, 11, false),
            Err(BasicError::Subscript)
        );
    }

    #[test]
    fn redimensioning_an_existing_array_errors() {
        let mut arena = Arena::new(256);
        let name = VarName::empty().push_char(b'C');
        array_element(&mut arena, name, 5, true).unwrap();
        assert_eq!(
            array_element(&mut arena, name, 5, true),
            Err(BasicError::Redimension)
        );
    }
}
