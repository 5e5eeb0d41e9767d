//! Language of a message's text.

use whatlang::Lang;

/// Two-letter (ISO 639-1) code of the language `text` is written in.
///
/// Absent when the text carries no letters to detect from. Latin is
/// reported as English: it only ever shows up as a misdetection of short
/// English business text.
pub fn detect_language(text: &str) -> Option<String> {
    let info = whatlang::detect(text)?;
    Some(language_code(info.lang()).to_string())
}

fn language_code(lang: Lang) -> &'static str {
    match lang {
        Lang::Lat | Lang::Eng => "en",
        Lang::Epo => "eo",
        Lang::Rus => "ru",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Ben => "bn",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ukr => "uk",
        Lang::Kat => "ka",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Jpn => "ja",
        Lang::Heb => "he",
        Lang::Yid => "yi",
        Lang::Pol => "pl",
        Lang::Amh => "am",
        Lang::Jav => "jv",
        Lang::Kor => "ko",
        Lang::Nob => "nb",
        Lang::Dan => "da",
        Lang::Swe => "sv",
        Lang::Fin => "fi",
        Lang::Tur => "tr",
        Lang::Nld => "nl",
        Lang::Hun => "hu",
        Lang::Ces => "cs",
        Lang::Ell => "el",
        Lang::Bul => "bg",
        Lang::Bel => "be",
        Lang::Mar => "mr",
        Lang::Kan => "kn",
        Lang::Ron => "ro",
        Lang::Slv => "sl",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Mkd => "mk",
        Lang::Lit => "lt",
        Lang::Lav => "lv",
        Lang::Est => "et",
        Lang::Tam => "ta",
        Lang::Vie => "vi",
        Lang::Urd => "ur",
        Lang::Tha => "th",
        Lang::Guj => "gu",
        Lang::Uzb => "uz",
        Lang::Pan => "pa",
        Lang::Aze => "az",
        Lang::Ind => "id",
        Lang::Tel => "te",
        Lang::Pes => "fa",
        Lang::Mal => "ml",
        Lang::Ori => "or",
        Lang::Mya => "my",
        Lang::Nep => "ne",
        Lang::Sin => "si",
        Lang::Khm => "km",
        Lang::Tuk => "tk",
        Lang::Aka => "ak",
        Lang::Zul => "zu",
        Lang::Sna => "sn",
        Lang::Afr => "af",
        Lang::Slk => "sk",
        Lang::Cat => "ca",
        Lang::Tgl => "tl",
        #[allow(unreachable_patterns)]
        other => other.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_common_languages() {
        let inputs = [
            (
                "Please find attached the signed contract for the new office lease. \
                 Let me know if you have any questions before the meeting tomorrow.",
                "en",
            ),
            (
                "Adjunto el contrato firmado para el nuevo alquiler de la oficina. \
                 Avísame si tienes alguna pregunta antes de la reunión de mañana.",
                "es",
            ),
            (
                "Anbei der unterschriebene Vertrag für die neue Büromiete. \
                 Sag mir Bescheid, wenn du vor dem Treffen morgen noch Fragen hast.",
                "de",
            ),
            (
                "Съешь ещё этих мягких французских булок, да выпей же чаю",
                "ru",
            ),
        ];
        for (text, expected) in inputs {
            assert_eq!(detect_language(text).as_deref(), Some(expected), "{text}");
        }
    }

    #[test]
    fn test_no_letters() {
        assert_eq!(detect_language(""), None);
        assert_eq!(detect_language("12345 !!! 678"), None);
    }

    #[test]
    fn test_latin_reported_as_english() {
        assert_eq!(language_code(Lang::Lat), "en");
        assert_eq!(language_code(Lang::Fra), "fr");
    }
}
