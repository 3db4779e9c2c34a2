//! Japanese address and phone helpers used by the registration workflow.
//!
//! Shopify returns province zone codes in ISO 3166-2 form (`JP-13`) while the
//! membership backend wants display names, and its customer mutations go the
//! other way. Both lookups run over the same static table.

/// ISO 3166-2:JP code and Japanese display name for each prefecture.
const PREFECTURES: [(&str, &str); 47] = [
    ("JP-01", "北海道"),
    ("JP-02", "青森県"),
    ("JP-03", "岩手県"),
    ("JP-04", "宮城県"),
    ("JP-05", "秋田県"),
    ("JP-06", "山形県"),
    ("JP-07", "福島県"),
    ("JP-08", "茨城県"),
    ("JP-09", "栃木県"),
    ("JP-10", "群馬県"),
    ("JP-11", "埼玉県"),
    ("JP-12", "千葉県"),
    ("JP-13", "東京都"),
    ("JP-14", "神奈川県"),
    ("JP-15", "新潟県"),
    ("JP-16", "富山県"),
    ("JP-17", "石川県"),
    ("JP-18", "福井県"),
    ("JP-19", "山梨県"),
    ("JP-20", "長野県"),
    ("JP-21", "岐阜県"),
    ("JP-22", "静岡県"),
    ("JP-23", "愛知県"),
    ("JP-24", "三重県"),
    ("JP-25", "滋賀県"),
    ("JP-26", "京都府"),
    ("JP-27", "大阪府"),
    ("JP-28", "兵庫県"),
    ("JP-29", "奈良県"),
    ("JP-30", "和歌山県"),
    ("JP-31", "鳥取県"),
    ("JP-32", "島根県"),
    ("JP-33", "岡山県"),
    ("JP-34", "広島県"),
    ("JP-35", "山口県"),
    ("JP-36", "徳島県"),
    ("JP-37", "香川県"),
    ("JP-38", "愛媛県"),
    ("JP-39", "高知県"),
    ("JP-40", "福岡県"),
    ("JP-41", "佐賀県"),
    ("JP-42", "長崎県"),
    ("JP-43", "熊本県"),
    ("JP-44", "大分県"),
    ("JP-45", "宮崎県"),
    ("JP-46", "鹿児島県"),
    ("JP-47", "沖縄県"),
];

/// Resolve a zone code like `JP-13` to its prefecture name.
///
/// Unknown codes pass through unchanged so a surprising value from the API
/// still lands in the form where an operator can see it.
#[must_use]
pub fn prefecture_name(zone_code: &str) -> String {
    PREFECTURES
        .iter()
        .find(|(code, _)| *code == zone_code)
        .map_or_else(|| zone_code.to_string(), |(_, name)| (*name).to_string())
}

/// Resolve a prefecture name back to its ISO zone code, if known.
#[must_use]
pub fn province_code(prefecture: &str) -> Option<&'static str> {
    PREFECTURES
        .iter()
        .find(|(_, name)| *name == prefecture)
        .map(|(code, _)| *code)
}

/// Rewrite an international Japanese phone number to local dial form.
///
/// `+81-3-1234-5678` and `+81312345678` both become `0312345678`; separators
/// are stripped either way. Numbers without the `+81` prefix are only
/// normalized, not prefixed.
#[must_use]
pub fn localize_phone(phone: &str) -> String {
    let digits: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    match digits.strip_prefix("+81") {
        Some(rest) => format!("0{rest}"),
        None => digits.replace('+', ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_code_maps_to_prefecture_name() {
        assert_eq!(prefecture_name("JP-13"), "東京都");
        assert_eq!(prefecture_name("JP-01"), "北海道");
        assert_eq!(prefecture_name("JP-47"), "沖縄県");
    }

    #[test]
    fn unknown_zone_code_passes_through() {
        assert_eq!(prefecture_name("US-CA"), "US-CA");
    }

    #[test]
    fn prefecture_name_maps_back_to_code() {
        assert_eq!(province_code("大阪府"), Some("JP-27"));
        assert_eq!(province_code("東京都"), Some("JP-13"));
        assert_eq!(province_code("テキサス"), None);
    }

    #[test]
    fn international_phone_becomes_local() {
        assert_eq!(localize_phone("+81312345678"), "0312345678");
        assert_eq!(localize_phone("+81-90-1234-5678"), "09012345678");
    }

    #[test]
    fn domestic_phone_is_only_normalized() {
        assert_eq!(localize_phone("03-1234-5678"), "0312345678");
        assert_eq!(localize_phone("0312345678"), "0312345678");
    }
}
