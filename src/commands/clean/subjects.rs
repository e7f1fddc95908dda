use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use super::strip::collapse_whitespace;
use crate::model::Subject;

fn is_list(name: &str) -> bool {
    matches!(name, "ul" | "ol")
}

/// Reads a two-level subject list into (child, parent) pairs.
///
/// Items nested in two or more lists are leaves under the most recent top-level
/// item; top-level items only set the parent and are not emitted.
pub fn parse_subject_tree(cell: Option<&str>) -> Vec<Subject> {
    let mut subjects = Vec::new();
    let Some(cell) = cell.map(str::trim).filter(|cell| !cell.is_empty()) else {
        return subjects;
    };
    let Ok(item_selector) = Selector::parse("li") else {
        return subjects;
    };

    let fragment = Html::parse_fragment(cell);
    let mut parent = String::new();

    for item in fragment.select(&item_selector) {
        let text = own_text(item);
        if text.is_empty() {
            continue;
        }

        let list_depth = item
            .ancestors()
            .filter_map(ElementRef::wrap)
            .filter(|ancestor| is_list(ancestor.value().name()))
            .count();

        if list_depth >= 2 {
            subjects.push(Subject {
                name: text,
                parent: parent.clone(),
            });
        } else {
            parent = text;
        }
    }

    subjects
}

/// Item text without the text of lists nested inside it.
fn own_text(item: ElementRef<'_>) -> String {
    fn collect(element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(data) if !is_list(data.name()) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        collect(child_element, out);
                    }
                }
                _ => {}
            }
        }
    }

    let mut buffer = String::new();
    collect(item, &mut buffer);
    collapse_whitespace(&buffer)
}
