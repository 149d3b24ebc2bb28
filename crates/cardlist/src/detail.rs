use scraper::{ElementRef, Html, Selector};

use crate::parser::{ParseError, elem_text};
use crate::types::Record;

/// Placeholder written when an attribute has no value on the card.
pub const ABSENT: &str = "-";

/// How a value cell of the status table is turned into text. Several
/// attributes are drawn as icons on the site, so the cell text alone is not
/// enough to read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// Empty cell whose value is the filename of the image it holds,
    /// e.g. `partimages/yellow.gif` -> `Yellow`.
    ImageStem,
    /// Two-way classification picked by the filename of the image in an
    /// otherwise empty cell.
    ImageToken {
        token: &'static str,
        matched: &'static str,
        otherwise: &'static str,
    },
    /// Empty cell holding one icon per point; text in the cell means none.
    IconCount,
    PlainText,
}

/// Labels with a non-textual encoding. Everything else is read as text.
const ATTRIBUTE_RULES: &[(&str, DecodeRule)] = &[
    ("Color", DecodeRule::ImageStem),
    ("Trigger", DecodeRule::ImageStem),
    (
        "Side",
        DecodeRule::ImageToken {
            token: "w",
            matched: "Weiss",
            otherwise: "Schwarz",
        },
    ),
    ("Soul", DecodeRule::IconCount),
];

impl DecodeRule {
    pub fn for_label(label: &str) -> Self {
        ATTRIBUTE_RULES
            .iter()
            .find(|(known, _)| *known == label)
            .map(|(_, rule)| *rule)
            .unwrap_or(DecodeRule::PlainText)
    }

    pub fn decode(self, cell: ElementRef) -> String {
        let text = elem_text(cell);
        let is_empty = text.trim().is_empty();

        match self {
            DecodeRule::ImageStem if is_empty => cell_image_stem(cell)
                .map(capitalize)
                .unwrap_or_else(|| ABSENT.to_string()),
            DecodeRule::ImageToken {
                token,
                matched,
                otherwise,
            } if is_empty => match cell_image_stem(cell) {
                Some(stem) if stem == token => matched.to_string(),
                Some(_) => otherwise.to_string(),
                None => ABSENT.to_string(),
            },
            DecodeRule::IconCount if is_empty => cell
                .children()
                .filter(|child| child.value().is_element())
                .count()
                .to_string(),
            DecodeRule::IconCount => ABSENT.to_string(),
            DecodeRule::ImageStem | DecodeRule::ImageToken { .. } | DecodeRule::PlainText => {
                strip_line_breaks(&text)
            }
        }
    }
}

fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}

/// Filename of `src` without directories or extension.
pub fn image_stem(src: &str) -> &str {
    let file = src.rsplit('/').next().unwrap_or(src);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

fn cell_image_stem(cell: ElementRef) -> Option<&str> {
    let img_sel = Selector::parse("img[src]").unwrap();
    cell.select(&img_sel)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(image_stem)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Decodes the status table of a card detail page. The first header/value
/// pair names the card and is skipped; the name comes from its own element.
pub fn parse_card_detail(html: &str, detail_url: &str) -> Result<Record, ParseError> {
    let document = Html::parse_document(html);
    let status_sel = Selector::parse(".status").unwrap();
    let name_sel = Selector::parse("span.kana").unwrap();
    let graphic_sel = Selector::parse("td.graphic img[src]").unwrap();
    let header_sel = Selector::parse("th:not(.graphic)").unwrap();
    let value_sel = Selector::parse("td:not(.graphic)").unwrap();

    let status = document
        .select(&status_sel)
        .next()
        .ok_or_else(|| ParseError::MissingDetailElement("status table".to_string()))?;

    let name = status
        .select(&name_sel)
        .next()
        .map(elem_text)
        .ok_or_else(|| ParseError::MissingDetailElement("card name".to_string()))?;

    let image_src = document
        .select(&graphic_sel)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or_else(|| ParseError::MissingDetailElement("card image".to_string()))?;

    let mut record = Record::new(name.trim(), format!("{}{}", detail_url, image_src));

    let headers = status.select(&header_sel).skip(1);
    let values = status.select(&value_sel).skip(1);

    for (header, cell) in headers.zip(values) {
        let label = elem_text(header).trim().to_string();
        if label.is_empty() {
            continue;
        }
        let value = DecodeRule::for_label(&label).decode(cell);
        log::trace!("{} = {}", label, value);
        record.push(label, value);
    }

    Ok(record)
}
