use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::types::{FieldKind, FieldSpec, FormSchema, ItemIdentifier, Method, ResultPage, SelectOption};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No search form found on page")]
    SchemaNotFound,
    #[error("Malformed result page: {0}")]
    MalformedResultPage(String),
    #[error("Missing detail element: {0}")]
    MissingDetailElement(String),
}

/// Value of the first query parameter in a link target, up to the next
/// `&` or fragment.
static RE_QUERY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?[^=]*=([^&#]+)").expect("invalid regex: query value"));

const SEARCH_FORM: &str = "form.cardSearchForm";
const INPUT_KINDS: [FieldKind; 4] = [
    FieldKind::Text,
    FieldKind::Checkbox,
    FieldKind::Hidden,
    FieldKind::Submit,
];

pub(crate) fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn parse_form_schema(html: &str) -> Result<FormSchema, ParseError> {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse(SEARCH_FORM).unwrap();
    let cell_sel = Selector::parse("table td").unwrap();
    let control_sel = Selector::parse("input, select").unwrap();

    let form = document
        .select(&form_sel)
        .next()
        .ok_or(ParseError::SchemaNotFound)?;

    let submit_url = form.value().attr("action").unwrap_or_default().trim().to_string();
    let method = Method::from_attr(form.value().attr("method"));

    let mut seen = HashSet::new();
    let mut fields = Vec::new();

    for cell in form.select(&cell_sel) {
        for control in cell.select(&control_sel) {
            let Some(field) = parse_control(control) else {
                continue;
            };
            if !seen.insert(field.name.clone()) {
                log::debug!("Skipping duplicate form field '{}'", field.name);
                continue;
            }
            fields.push(field);
        }
    }

    log::debug!(
        "Parsed search form: {} {} with {} field(s)",
        method,
        submit_url,
        fields.len()
    );

    Ok(FormSchema {
        submit_url,
        method,
        fields,
    })
}

fn parse_control(control: ElementRef) -> Option<FieldSpec> {
    let el = control.value();
    let name = el.attr("name").map(str::trim).filter(|n| !n.is_empty());
    let Some(name) = name else {
        log::debug!("Skipping unnamed <{}> control", el.name());
        return None;
    };
    let id = el.attr("id").map(str::to_string);

    if el.name() == "select" {
        return Some(FieldSpec {
            kind: FieldKind::Select,
            name: name.to_string(),
            id,
            default_value: el.attr("value").unwrap_or_default().to_string(),
            options: parse_options(control),
        });
    }

    let declared = el.attr("type").unwrap_or("text");
    let kind = match declared.parse::<FieldKind>() {
        Ok(kind) if INPUT_KINDS.contains(&kind) => kind,
        _ => {
            log::debug!("Ignoring input '{}' of type '{}'", name, declared);
            return None;
        }
    };

    Some(FieldSpec {
        kind,
        name: name.to_string(),
        id,
        default_value: el.attr("value").unwrap_or_default().to_string(),
        options: Vec::new(),
    })
}

fn parse_options(select: ElementRef) -> Vec<SelectOption> {
    let option_sel = Selector::parse("option").unwrap();

    select
        .select(&option_sel)
        .map(|opt| {
            let label = normalize_whitespace(&elem_text(opt));
            let value = opt
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| label.clone());
            SelectOption { value, label }
        })
        .collect()
}

/// Card number carried in a result row link, e.g.
/// `/cardlist/?cardno=AB/W31-E058&l` -> `AB/W31-E058`.
pub fn parse_item_identifier(href: &str) -> Option<ItemIdentifier> {
    RE_QUERY_VALUE
        .captures(href)
        .map(|caps| ItemIdentifier::new(caps[1].trim()))
        .filter(|id| !id.as_str().is_empty())
}

pub fn parse_result_items(html: &str) -> Result<Vec<ItemIdentifier>, ParseError> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("div#searchResults table#searchResult-table").unwrap();
    let row_link_sel = Selector::parse("th a[href]").unwrap();

    let table = document.select(&table_sel).next().ok_or_else(|| {
        ParseError::MalformedResultPage("results table not found".to_string())
    })?;

    Ok(table
        .select(&row_link_sel)
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let id = parse_item_identifier(href);
            if id.is_none() {
                log::debug!("Result link without card number: {}", href);
            }
            id
        })
        .collect())
}

/// Page links worth visiting from the pagination control. The trailing
/// anchors are navigation ("next", "last") rather than page numbers: two of
/// them when the control contains an ellipsis marker, one otherwise.
pub fn parse_page_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let pager_sel = Selector::parse("p.pageLink").unwrap();
    let anchor_sel = Selector::parse("a").unwrap();
    let ellipsis_sel = Selector::parse("span").unwrap();

    let Some(pager) = document.select(&pager_sel).next() else {
        return Vec::new();
    };

    let mut anchors: Vec<ElementRef> = pager.select(&anchor_sel).collect();

    let trailing = if pager.select(&ellipsis_sel).next().is_some() {
        2
    } else {
        1
    };
    anchors.truncate(anchors.len().saturating_sub(trailing));

    anchors
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect()
}

/// Items and follow-up page links of one result listing. A page without a
/// results table contributes no items.
pub fn parse_result_page(html: &str) -> ResultPage {
    let items = parse_result_items(html).unwrap_or_else(|e| {
        log::warn!("{}; treating page as empty", e);
        Vec::new()
    });

    ResultPage {
        items,
        next_page_links: parse_page_links(html),
    }
}
