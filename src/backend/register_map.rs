use crate::instructions::instructions::{arch_reg, Tag, ARCH_REG_COUNT};

pub(crate) struct RegMapEntry {
    pub(crate) producer: Tag,
    // false means no outstanding writer; the value is ready directly from
    // architectural state
    pub(crate) valid: bool,
}

/// Maps an architectural register to the tag of its youngest in-flight
/// writer. Renaming overwrites unconditionally; a broadcast clears the
/// entry only while the broadcasting instruction still is the youngest
/// writer.
pub(crate) struct RegisterMap {
    table: Vec<RegMapEntry>,
}

impl RegisterMap {
    pub(crate) fn new() -> RegisterMap {
        let mut table = Vec::with_capacity(ARCH_REG_COUNT);
        for _ in 0..ARCH_REG_COUNT {
            table.push(RegMapEntry {
                producer: 0,
                valid: false,
            });
        }
        RegisterMap { table }
    }

    pub(crate) fn rename(&mut self, dest_reg: i16, tag: Tag) {
        if let Some(reg) = arch_reg(dest_reg) {
            let entry = &mut self.table[reg];
            entry.producer = tag;
            entry.valid = true;
        }
    }

    // None means the source is trivially ready.
    pub(crate) fn lookup(&self, src_reg: i16) -> Option<Tag> {
        let reg = arch_reg(src_reg)?;
        let entry = &self.table[reg];
        if entry.valid {
            Some(entry.producer)
        } else {
            None
        }
    }

    pub(crate) fn clear_if_equal(&mut self, dest_reg: i16, tag: Tag) {
        if let Some(reg) = arch_reg(dest_reg) {
            let entry = &mut self.table[reg];
            if entry.valid && entry.producer == tag {
                entry.valid = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_then_lookup() {
        let mut reg_map = RegisterMap::new();
        assert_eq!(reg_map.lookup(5), None);

        reg_map.rename(5, 1);
        assert_eq!(reg_map.lookup(5), Some(1));
        assert_eq!(reg_map.lookup(6), None);
    }

    #[test]
    fn test_invalid_registers_are_none() {
        let mut reg_map = RegisterMap::new();
        reg_map.rename(-1, 1);
        reg_map.rename(128, 2);
        assert_eq!(reg_map.lookup(-1), None);
        assert_eq!(reg_map.lookup(128), None);
    }

    #[test]
    fn test_younger_writer_overwrites() {
        let mut reg_map = RegisterMap::new();
        reg_map.rename(3, 1);
        reg_map.rename(3, 2);
        assert_eq!(reg_map.lookup(3), Some(2));
    }

    #[test]
    fn test_clear_only_while_youngest() {
        let mut reg_map = RegisterMap::new();
        reg_map.rename(3, 1);
        reg_map.rename(3, 2);

        // the older writer broadcasts; the younger one still owns the entry
        reg_map.clear_if_equal(3, 1);
        assert_eq!(reg_map.lookup(3), Some(2));

        reg_map.clear_if_equal(3, 2);
        assert_eq!(reg_map.lookup(3), None);
    }
}
