//! End-to-end scenarios for the four mapping shapes
//!
//! Each test builds a small workbook in memory, maps it, and checks values
//! together with the positions the mapper reports.

use pretty_assertions::assert_eq;
use royalbit_sheetmap::mapping::*;
use royalbit_sheetmap::workbook::CellValue;
use royalbit_sheetmap::{
    CellAddress, FieldMetadata, FieldOptions, SheetMapError, SheetMapper, Workbook,
};

fn addr(text: &str) -> CellAddress {
    text.parse().unwrap()
}

fn text(workbook: &mut Workbook, name: &str, address: &str, value: &str) {
    workbook
        .add_sheet(name)
        .set_value(addr(address), CellValue::Text(value.to_string()));
}

// ═══════════════════════════════════════════════════════════════════════════
// SINGLE CELL
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Hello {
    msg: Option<String>,
    meta: FieldMetadata,
}

impl Record for Hello {
    fn metadata(&self) -> Option<&FieldMetadata> {
        Some(&self.meta)
    }

    fn metadata_mut(&mut self) -> Option<&mut FieldMetadata> {
        Some(&mut self.meta)
    }
}

impl SheetRecord for Hello {
    fn sheet() -> SheetSelector {
        SheetSelector::name("Sheet1")
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::cell(
            "msg",
            CellMapping::at("B4"),
            |r: &Hello| r.msg.clone(),
            |r: &mut Hello, v| r.msg = v,
        )]
    }
}

#[test]
fn test_single_cell_load() {
    let mut workbook = Workbook::new();
    text(&mut workbook, "Sheet1", "B4", "hello");

    let outcome = SheetMapper::new()
        .load_detail_from_workbook::<Hello>(&workbook)
        .unwrap();
    assert!(!outcome.has_errors());
    assert_eq!(outcome.sheet_name(), Some("Sheet1"));
    assert_eq!(outcome.metadata().position("msg"), Some(addr("B4")));

    let hello = outcome.into_target();
    assert_eq!(hello.msg.as_deref(), Some("hello"));
    assert_eq!(hello.meta.position("msg"), Some(addr("B4")));
}

// ═══════════════════════════════════════════════════════════════════════════
// ARRAY WITH MERGED ITEMS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Sentence {
    words: Vec<Option<String>>,
    meta: FieldMetadata,
}

impl Record for Sentence {
    fn metadata(&self) -> Option<&FieldMetadata> {
        Some(&self.meta)
    }

    fn metadata_mut(&mut self) -> Option<&mut FieldMetadata> {
        Some(&mut self.meta)
    }
}

impl SheetRecord for Sentence {
    fn sheet() -> SheetSelector {
        SheetSelector::index(0)
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::array(
            "words",
            ArrayMapping::new("B4", 5).item_merged(),
            |r: &Sentence| r.words.clone(),
            |r: &mut Sentence, v| r.words = v,
        )]
    }
}

#[test]
fn test_array_with_merged_items() {
    let mut workbook = Workbook::new();
    text(&mut workbook, "Sheet1", "B4", "今日は");
    text(&mut workbook, "Sheet1", "D4", "、");
    text(&mut workbook, "Sheet1", "E4", "いい天気ですね。");
    let sheet = workbook.sheet_mut("Sheet1").unwrap();
    sheet.add_merged_region("B4:C4".parse().unwrap());
    sheet.add_merged_region("E4:F4".parse().unwrap());

    let sentence: Sentence = SheetMapper::new().load_from_workbook(&workbook).unwrap();
    assert_eq!(
        sentence.words,
        vec![
            Some("今日は".to_string()),
            Some("、".to_string()),
            Some("いい天気ですね。".to_string()),
        ]
    );
    assert_eq!(sentence.meta.position("words[0]"), Some(addr("B4")));
    assert_eq!(sentence.meta.position("words[1]"), Some(addr("D4")));
    assert_eq!(sentence.meta.position("words[2]"), Some(addr("E4")));
    assert_eq!(sentence.meta.position("words[3]"), None);
}

#[test]
fn test_merged_pair_then_plain_cell_reads_two_values() {
    let mut workbook = Workbook::new();
    text(&mut workbook, "Sheet1", "B4", "merged");
    text(&mut workbook, "Sheet1", "D4", "plain");
    workbook
        .sheet_mut("Sheet1")
        .unwrap()
        .add_merged_region("B4:C4".parse().unwrap());

    #[derive(Debug, Default)]
    struct Pair {
        items: Vec<Option<String>>,
    }

    impl Record for Pair {}

    impl SheetRecord for Pair {
        fn sheet() -> SheetSelector {
            SheetSelector::index(0)
        }

        fn fields() -> Vec<FieldBinding<Self>> {
            vec![FieldBinding::array(
                "items",
                ArrayMapping::new("B4", 3).item_merged(),
                |r: &Pair| r.items.clone(),
                |r: &mut Pair, v| r.items = v,
            )]
        }
    }

    let pair: Pair = SheetMapper::new().load_from_workbook(&workbook).unwrap();
    assert_eq!(
        pair.items,
        vec![Some("merged".to_string()), Some("plain".to_string())]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// RECORDS UNDER A TABLE LABEL
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, PartialEq)]
struct Member {
    id: Option<i32>,
    name: Option<String>,
    meta: FieldMetadata,
}

impl Record for Member {
    fn metadata(&self) -> Option<&FieldMetadata> {
        Some(&self.meta)
    }

    fn metadata_mut(&mut self) -> Option<&mut FieldMetadata> {
        Some(&mut self.meta)
    }
}

impl RowRecord for Member {
    fn columns() -> Vec<ColumnBinding<Self>> {
        vec![
            ColumnBinding::column(
                "id",
                ColumnMapping::new("ID"),
                |r: &Member| r.id,
                |r: &mut Member, v| r.id = v,
            ),
            ColumnBinding::column(
                "name",
                ColumnMapping::new("Name"),
                |r: &Member| r.name.clone(),
                |r: &mut Member, v| r.name = v,
            ),
        ]
    }
}

#[derive(Debug, Default)]
struct Roster {
    members: Vec<Member>,
}

impl Record for Roster {}

impl SheetRecord for Roster {
    fn sheet() -> SheetSelector {
        SheetSelector::name("Roster")
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::records(
            "members",
            RecordsMapping::horizontal().table_label("氏名"),
            |r: &mut Roster| &mut r.members,
        )]
    }
}

#[test]
fn test_records_under_table_label() {
    let mut workbook = Workbook::new();
    text(&mut workbook, "Roster", "A3", "氏名");
    text(&mut workbook, "Roster", "A4", "ID");
    text(&mut workbook, "Roster", "B4", "Name");
    for (i, name) in ["Sato", "Suzuki", "Takahashi"].iter().enumerate() {
        let row = 5 + i;
        let sheet = workbook.sheet_mut("Roster").unwrap();
        sheet.set_value(addr(&format!("A{}", row)), CellValue::Number(i as f64 + 1.0));
        sheet.set_value(addr(&format!("B{}", row)), CellValue::Text(name.to_string()));
    }
    text(&mut workbook, "Roster", "A10", "not a record");

    let outcome = SheetMapper::new()
        .load_detail_from_workbook::<Roster>(&workbook)
        .unwrap();
    assert!(!outcome.has_errors());
    assert_eq!(outcome.metadata().position("members[2].name"), Some(addr("B7")));

    let roster = outcome.into_target();
    assert_eq!(roster.members.len(), 3);
    let names: Vec<&str> = roster
        .members
        .iter()
        .filter_map(|m| m.name.as_deref())
        .collect();
    assert_eq!(names, vec!["Sato", "Suzuki", "Takahashi"]);
    assert_eq!(roster.members[0].id, Some(1));
    assert_eq!(roster.members[1].meta.position("id"), Some(addr("A6")));
    assert_eq!(roster.members[1].meta.position("name"), Some(addr("B6")));
    assert_eq!(roster.members[2].meta.label("name"), Some("Name"));
}

// ═══════════════════════════════════════════════════════════════════════════
// DEFAULT VALUE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Quota {
    limit: Option<i32>,
}

impl Record for Quota {}

impl SheetRecord for Quota {
    fn sheet() -> SheetSelector {
        SheetSelector::index(0)
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::cell(
            "limit",
            CellMapping::at("A11"),
            |r: &Quota| r.limit,
            |r: &mut Quota, v| r.limit = v,
        )
        .with_options(
            FieldOptions::new()
                .with_default_value("100")
                .with_excel_pattern("#,##0"),
        )]
    }
}

#[test]
fn test_default_value_on_blank_number() {
    let mut workbook = Workbook::new();
    workbook.add_sheet("Sheet1");
    let mapper = SheetMapper::new();

    let mut quota: Quota = mapper.load_from_workbook(&workbook).unwrap();
    assert_eq!(quota.limit, Some(100));

    mapper.save_to_workbook(&mut workbook, &mut quota).unwrap();
    let sheet = workbook.sheet("Sheet1").unwrap();
    assert_eq!(sheet.value(addr("A11")), &CellValue::Number(100.0));
    assert_eq!(sheet.cell(addr("A11")).style.number_format.as_deref(), Some("#,##0"));
    assert_eq!(sheet.formatted_text(addr("A11")), "100");

    // An absent value falls back to the default on save too
    let mut empty = Quota::default();
    workbook
        .sheet_mut("Sheet1")
        .unwrap()
        .clear(addr("A11"));
    mapper.save_to_workbook(&mut workbook, &mut empty).unwrap();
    assert_eq!(
        workbook.sheet("Sheet1").unwrap().value(addr("A11")),
        &CellValue::Number(100.0)
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// ARRAY OVERFLOW
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Strict {
    values: Vec<Option<String>>,
}

impl Record for Strict {}

impl SheetRecord for Strict {
    fn sheet() -> SheetSelector {
        SheetSelector::index(0)
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::array(
            "values",
            ArrayMapping::new("A1", 3).on_over(ArrayOver::Error),
            |r: &Strict| r.values.clone(),
            |r: &mut Strict, v| r.values = v,
        )]
    }
}

#[test]
fn test_array_overflow_is_rejected() {
    let mut workbook = Workbook::new();
    workbook.add_sheet("Sheet1");
    let mut record = Strict {
        values: ["a", "b", "c", "d"].iter().map(|s| Some(s.to_string())).collect(),
    };

    let result = SheetMapper::new().save_to_workbook(&mut workbook, &mut record);
    match result {
        Err(SheetMapError::AnnotationInvalid { field, message }) => {
            assert_eq!(field, "values");
            assert_eq!(message, "size (3) exceeded by data size (4)");
        }
        other => panic!("expected AnnotationInvalid, got {:?}", other),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FORMULA CONTINUE-NUMBER
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Numbered {
    numbers: Vec<Option<i32>>,
}

impl Record for Numbered {}

impl SheetRecord for Numbered {
    fn sheet() -> SheetSelector {
        SheetSelector::name("List")
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::array(
            "numbers",
            ArrayMapping::new("B5", 3).vertical(),
            |r: &Numbered| r.numbers.clone(),
            |r: &mut Numbered, v| r.numbers = v,
        )
        .with_options(FieldOptions::new().with_formula("ROW()-4"))]
    }
}

#[test]
fn test_formula_fills_empty_array() {
    let mut template = Workbook::new();
    template.add_sheet("List");
    let mapper = SheetMapper::new();

    let mut bytes = Vec::new();
    mapper
        .save_to_writer(&template, &mut bytes, &mut Numbered::default())
        .unwrap();

    let saved = Workbook::from_bytes(&bytes).unwrap();
    let sheet = saved.sheet("List").unwrap();
    for address in ["B5", "B6", "B7"] {
        assert_eq!(sheet.cell(addr(address)).formula.as_deref(), Some("ROW()-4"));
    }
    assert_eq!(sheet.cell(addr("B8")).formula, None);

    let loaded: Numbered = mapper.load_from_workbook(&saved).unwrap();
    assert_eq!(loaded.numbers, vec![Some(1), Some(2), Some(3)]);

    // The template itself is untouched
    assert!(template.sheet("List").unwrap().is_blank(addr("B5")));
}
