/// Strips invisible characters and collapses internal whitespace.
pub(crate) fn collapse(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn header_key(value: &str) -> String {
    collapse(value).to_ascii_lowercase().replace([' ', '-'], "_")
}

pub(crate) fn district_key(value: &str) -> String {
    collapse(value).to_lowercase()
}

/// Title-cases every alphabetic run, so "NEW  delhi-north" becomes "New Delhi-North".
pub(crate) fn district_display(value: &str) -> String {
    let mut display = String::with_capacity(value.len());
    let mut at_word_start = true;
    for ch in collapse(value).chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                display.extend(ch.to_uppercase());
            } else {
                display.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            display.push(ch);
            at_word_start = true;
        }
    }
    display
}

pub(crate) fn vaccine_key(value: &str) -> String {
    collapse(value).to_uppercase()
}

/// Grouping key for free-text categories such as age groups.
pub(crate) fn label_key(value: &str) -> String {
    collapse(value).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_removes_bom_and_extra_whitespace() {
        assert_eq!(collapse("\u{feff}  Hepatitis   B "), "Hepatitis B");
    }

    #[test]
    fn district_forms_share_one_key() {
        assert_eq!(district_key(" AMRITSAR"), district_key("amritsar "));
        assert_eq!(district_display("  fatehgarh   SAHIB"), "Fatehgarh Sahib");
        assert_eq!(district_display("sas nagar-mohali"), "Sas Nagar-Mohali");
    }

    #[test]
    fn vaccine_key_is_case_insensitive() {
        assert_eq!(vaccine_key("dpt1"), "DPT1");
        assert_eq!(vaccine_key(" Hepatitis  b"), "HEPATITIS B");
    }

    #[test]
    fn header_key_accepts_spaced_headers() {
        assert_eq!(header_key("Coverage Percentage"), "coverage_percentage");
        assert_eq!(header_key("\u{feff}District"), "district");
        assert_eq!(header_key("vaccine-type"), "vaccine_type");
    }
}
