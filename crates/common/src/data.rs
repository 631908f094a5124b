use std::io::{Cursor, Read, Write};

use crate::error::Error;

#[inline(always)]
pub fn read_u8(data: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    let mut buffer = [0x00; 1];
    data.read_exact(&mut buffer)?;
    Ok(buffer[0])
}

#[inline(always)]
pub fn write_u8(data: &mut Cursor<Vec<u8>>, value: u8) -> Result<(), Error> {
    data.write_all(&[value])?;
    Ok(())
}
