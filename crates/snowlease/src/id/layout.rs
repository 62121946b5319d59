use crate::SnowflakeId;
use core::fmt;

/// One bit field of a Snowflake layout, as rendered by [`write_bit_layout_debug`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub bits: u32,
    pub value: u64,
}

/// Returns the fields of `id` from most to least significant, omitting
/// zero-width fields.
pub fn fields<ID: SnowflakeId>(id: &ID) -> Vec<FieldLayout> {
    [
        FieldLayout {
            name: "reserved",
            bits: ID::RESERVED_BITS,
            value: 0,
        },
        FieldLayout {
            name: "timestamp",
            bits: ID::TIMESTAMP_BITS,
            value: id.timestamp(),
        },
        FieldLayout {
            name: "worker_id",
            bits: ID::MACHINE_ID_BITS,
            value: id.machine_id(),
        },
        FieldLayout {
            name: "sequence",
            bits: ID::SEQUENCE_BITS,
            value: id.sequence(),
        },
    ]
    .into_iter()
    .filter(|field| field.bits > 0)
    .collect()
}

/// Renders an ID as a boxed table of its bit fields in decimal and hex.
///
/// Used by the `Debug` impls generated by [`define_snowflake_id!`].
///
/// [`define_snowflake_id!`]: crate::define_snowflake_id
pub fn write_bit_layout_debug<ID: SnowflakeId>(
    f: &mut fmt::Formatter<'_>,
    id: &ID,
    type_name: &str,
) -> fmt::Result {
    let visible_fields = fields(id);

    // Max width per column: label, dec, hex
    let columns: Vec<usize> = visible_fields
        .iter()
        .map(|field| {
            let label_len = format!("{} ({})", field.name, field.bits).len();
            let dec_len = field.value.to_string().len();
            let hex_len = format!("0x{:x}", field.value).len();
            label_len.max(dec_len).max(hex_len) + 2
        })
        .collect();

    fn center(s: impl ToString, width: usize) -> String {
        let s = s.to_string();
        let len = s.len();
        if len >= width {
            return s;
        }
        let pad = width - len;
        let left = pad / 2;
        let right = pad - left;
        format!("{}{}{}", " ".repeat(left), s, " ".repeat(right))
    }

    fn border(f: &mut fmt::Formatter<'_>, columns: &[usize]) -> fmt::Result {
        write!(f, "        +")?;
        for &w in columns {
            write!(f, "{}+", "-".repeat(w))?;
        }
        writeln!(f)
    }

    let raw = id.to_raw();
    writeln!(f, "{type_name} {{")?;
    writeln!(f, "    raw id     : 0x{raw:016x} ({raw})")?;
    writeln!(f, "    layout     :")?;

    border(f, &columns)?;
    write!(f, "        |")?;
    for (field, &w) in visible_fields.iter().zip(&columns) {
        write!(f, "{}|", center(format!("{} ({})", field.name, field.bits), w))?;
    }
    writeln!(f)?;
    border(f, &columns)?;

    write!(f, "        |")?;
    for (field, &w) in visible_fields.iter().zip(&columns) {
        write!(f, "{}|", center(field.value, w))?;
    }
    writeln!(f)?;

    write!(f, "        |")?;
    for (field, &w) in visible_fields.iter().zip(&columns) {
        write!(f, "{}|", center(format!("0x{:x}", field.value), w))?;
    }
    writeln!(f)?;
    border(f, &columns)?;

    write!(f, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LeaseSnowflakeId;

    #[test]
    fn debug_renders_every_field() {
        let id = LeaseSnowflakeId::from_components(1000, 7, 3);
        let rendered = format!("{id:?}");
        assert!(rendered.starts_with("LeaseSnowflakeId {"));
        assert!(rendered.contains("reserved (1)"));
        assert!(rendered.contains("timestamp (41)"));
        assert!(rendered.contains("worker_id (10)"));
        assert!(rendered.contains("sequence (12)"));
        assert!(rendered.contains("0x3e8"));
    }

    #[test]
    fn fields_are_ordered_msb_first() {
        let id = LeaseSnowflakeId::from_components(5, 6, 7);
        let names: Vec<_> = fields(&id).iter().map(|f| f.name).collect();
        assert_eq!(names, ["reserved", "timestamp", "worker_id", "sequence"]);
        let total: u32 = fields(&id).iter().map(|f| f.bits).sum();
        assert_eq!(total, 64);
    }
}
