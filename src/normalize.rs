//! Arabic text normalization for diacritic-insensitive search.

/// Normalize Arabic text so orthographic variants compare equal.
///
/// Pipeline: case-fold, strip harakat and Qur'anic annotation marks plus
/// tatweel, fold Alef variants to bare Alef, Alef-Maksura to Yaa, and
/// Taa-Marbuta to Haa, then trim. Total over any input.
pub fn normalize(text: &str) -> String {
  let mut out = String::with_capacity(text.len());
  for c in text.to_lowercase().chars() {
    match c {
      // harakat/diacritics and Qur'anic marks
      '\u{064B}'..='\u{065F}' | '\u{0670}' | '\u{06D6}'..='\u{06ED}' => {}
      // tatweel
      '\u{0640}' => {}
      // alef forms
      'إ' | 'أ' | 'آ' | 'ٱ' => out.push('ا'),
      // yaa/maqsuura
      'ى' => out.push('ي'),
      // taa marbuta
      'ة' => out.push('ه'),
      _ => out.push(c),
    }
  }
  out.trim().to_string()
}

/// Substring match over normalized forms.
pub fn matches(haystack: &str, needle: &str) -> bool {
  normalize(haystack).contains(&normalize(needle))
}
