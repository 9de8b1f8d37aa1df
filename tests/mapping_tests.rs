//! Labelled cells, arrays, failure modes, sheet selection and side channels

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use royalbit_sheetmap::converter::{CellConverter, ConvertError};
use royalbit_sheetmap::formatter::XlsEnum;
use royalbit_sheetmap::mapping::*;
use royalbit_sheetmap::workbook::{CellValue, Sheet};
use royalbit_sheetmap::{
    CellAddress, CellRange, ErrorKind, FieldMetadata, FieldOptions, MapperConfig, SheetMapError, SheetMapper,
    Workbook,
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
// APPLICATION FORM (labelled cells of every supported type)
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq)]
enum Grade {
    Admin,
    Member,
}

impl XlsEnum for Grade {
    fn variants() -> &'static [Self] {
        &[Grade::Admin, Grade::Member]
    }

    fn name(&self) -> &'static str {
        match self {
            Grade::Admin => "Admin",
            Grade::Member => "Member",
        }
    }

    fn alias(&self) -> Option<&'static str> {
        Some(match self {
            Grade::Admin => "管理者",
            Grade::Member => "一般",
        })
    }
}

#[derive(Debug, Default)]
struct Application {
    name: Option<String>,
    age: Option<i32>,
    joined: Option<NaiveDate>,
    active: Option<bool>,
    grade: Option<Grade>,
    phone: Option<String>,
    note: Option<String>,
    meta: FieldMetadata,
}

impl Record for Application {
    fn metadata(&self) -> Option<&FieldMetadata> {
        Some(&self.meta)
    }

    fn metadata_mut(&mut self) -> Option<&mut FieldMetadata> {
        Some(&mut self.meta)
    }
}

impl SheetRecord for Application {
    fn sheet() -> SheetSelector {
        SheetSelector::name("申請書")
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![
            FieldBinding::labelled_cell(
                "name",
                LabelledCellMapping::new("氏名"),
                |r: &Application| r.name.clone(),
                |r: &mut Application, v| r.name = v,
            ),
            FieldBinding::labelled_cell(
                "age",
                LabelledCellMapping::new("年齢"),
                |r: &Application| r.age,
                |r: &mut Application, v| r.age = v,
            ),
            FieldBinding::labelled_cell(
                "joined",
                LabelledCellMapping::new("登録日"),
                |r: &Application| r.joined,
                |r: &mut Application, v| r.joined = v,
            )
            .with_options(FieldOptions::new().with_pattern("yyyy/M/d")),
            FieldBinding::labelled_cell(
                "active",
                LabelledCellMapping::new("会員"),
                |r: &Application| r.active,
                |r: &mut Application, v| r.active = v,
            ),
            FieldBinding::labelled_cell(
                "grade",
                LabelledCellMapping::new("区分"),
                |r: &Application| r.grade,
                |r: &mut Application, v| r.grade = v,
            )
            .with_options(FieldOptions::new().with_enum_alias()),
            FieldBinding::labelled_cell(
                "phone",
                LabelledCellMapping::new("電話").header_label("連絡先"),
                |r: &Application| r.phone.clone(),
                |r: &mut Application, v| r.phone = v,
            ),
            FieldBinding::labelled_cell(
                "note",
                LabelledCellMapping::new("備考").optional(),
                |r: &Application| r.note.clone(),
                |r: &mut Application, v| r.note = v,
            ),
        ]
    }
}

fn application(age: &str) -> Workbook {
    let mut workbook = Workbook::new();
    let form = "申請書";
    text(&mut workbook, form, "A1", "電話");
    text(&mut workbook, form, "B1", "000-0000");
    text(&mut workbook, form, "A2", "氏名");
    text(&mut workbook, form, "C2", "山田 太郎");
    text(&mut workbook, form, "A3", "年齢");
    text(&mut workbook, form, "B3", age);
    text(&mut workbook, form, "A4", "登録日");
    text(&mut workbook, form, "A5", "会員");
    text(&mut workbook, form, "B5", "○");
    text(&mut workbook, form, "A6", "区分");
    text(&mut workbook, form, "B6", "管理者");
    text(&mut workbook, form, "A8", "連絡先");
    text(&mut workbook, form, "A9", "電話");
    text(&mut workbook, form, "B9", "03-1234-5678");

    let sheet = workbook.sheet_mut(form).unwrap();
    sheet.add_merged_region("A2:B2".parse().unwrap());
    let joined = NaiveDate::from_ymd_opt(2024, 4, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    sheet.set_value(addr("B4"), CellValue::DateTime(joined));
    sheet.set_number_format(addr("B4"), Some("yyyy/m/d"));
    workbook
}

#[test]
fn test_labelled_cells_of_every_type() {
    let outcome = SheetMapper::new()
        .load_detail_from_workbook::<Application>(&application("42"))
        .unwrap();
    assert!(outcome.errors().is_empty(), "{:?}", outcome.errors());

    let form = outcome.target();
    assert_eq!(form.name.as_deref(), Some("山田 太郎"));
    assert_eq!(form.age, Some(42));
    assert_eq!(form.joined, NaiveDate::from_ymd_opt(2024, 4, 1));
    assert_eq!(form.active, Some(true));
    assert_eq!(form.grade, Some(Grade::Admin));
    assert_eq!(form.phone.as_deref(), Some("03-1234-5678"));
    assert_eq!(form.note, None);

    // The merged label A2:B2 is stepped over as a whole
    assert_eq!(form.meta.position("name"), Some(addr("C2")));
    assert_eq!(form.meta.label("name"), Some("氏名"));
    assert_eq!(form.meta.position("phone"), Some(addr("B9")));
    assert_eq!(outcome.metadata().label("age"), Some("年齢"));
    assert_eq!(form.meta.position("note"), None);
}

#[test]
fn test_labelled_cells_write_back_in_place() {
    let mut workbook = application("42");
    let mapper = SheetMapper::new();
    let mut form: Application = mapper.load_from_workbook(&workbook).unwrap();
    form.age = Some(43);
    form.active = Some(false);
    form.grade = Some(Grade::Member);
    form.joined = NaiveDate::from_ymd_opt(2025, 1, 31);

    let report = mapper.save_to_workbook(&mut workbook, &mut form).unwrap();
    assert_eq!(report.sheet_name(), Some("申請書"));
    assert_eq!(report.metadata().position("age"), Some(addr("B3")));

    let sheet = workbook.sheet("申請書").unwrap();
    assert_eq!(sheet.value(addr("B3")), &CellValue::Number(43.0));
    assert_eq!(sheet.value(addr("B5")), &CellValue::Bool(false));
    assert_eq!(sheet.value(addr("B6")), &CellValue::Text("一般".to_string()));
    assert_eq!(sheet.formatted_text(addr("B4")), "2025/1/31");
    // The optional label is still missing; nothing is written for it
    assert!(sheet.is_blank(addr("B7")));
}

// ═══════════════════════════════════════════════════════════════════════════
// CONVERSION FAILURE MODES
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_conversion_failures_are_accumulated() {
    let outcome = SheetMapper::new()
        .load_detail_from_workbook::<Application>(&application("forty"))
        .unwrap();

    assert_eq!(outcome.errors().len(), 1);
    let error = &outcome.errors()[0];
    assert_eq!(error.kind, ErrorKind::Conversion);
    assert_eq!(error.field_path, "age");
    assert_eq!(error.sheet_name, "申請書");
    assert_eq!(error.address, Some(addr("B3")));
    assert_eq!(error.label.as_deref(), Some("年齢"));
    assert_eq!(error.type_name.as_deref(), Some("i32"));
    assert_eq!(error.observed_text.as_deref(), Some("forty"));
    assert_eq!(outcome.field_errors("age").count(), 1);
    assert_eq!(outcome.cell_errors(addr("B3")).count(), 1);

    // Other fields are unaffected and the failed one keeps its zero value
    assert_eq!(outcome.target().age, None);
    assert_eq!(outcome.target().name.as_deref(), Some("山田 太郎"));
}

#[test]
fn test_load_fails_on_first_accumulated_error() {
    let result = SheetMapper::new().load_from_workbook::<Application>(&application("forty"));
    match result {
        Err(SheetMapError::TypeBind(error)) => assert_eq!(error.field_path, "age"),
        other => panic!("expected TypeBind, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_skip_type_bind_failure_drops_errors() {
    let mapper =
        SheetMapper::with_config(MapperConfig::default().with_skip_type_bind_failure(true));
    let outcome = mapper
        .load_detail_from_workbook::<Application>(&application("forty"))
        .unwrap();
    assert!(!outcome.has_errors());
    assert_eq!(outcome.target().age, None);
    assert_eq!(outcome.target().grade, Some(Grade::Admin));
}

#[test]
fn test_fail_fast_aborts_the_load() {
    let mapper =
        SheetMapper::with_config(MapperConfig::default().with_continue_type_bind_failure(false));
    let result = mapper.load_detail_from_workbook::<Application>(&application("forty"));
    assert!(matches!(result, Err(SheetMapError::TypeBind(ref e)) if e.field_path == "age"));
}

// ═══════════════════════════════════════════════════════════════════════════
// LABEL MATCHING MODES
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Total {
    amount: Option<f64>,
}

impl Record for Total {}

impl SheetRecord for Total {
    fn sheet() -> SheetSelector {
        SheetSelector::index(0)
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::labelled_cell(
            "amount",
            LabelledCellMapping::new("/合計.*/").position(LabelPosition::Down),
            |r: &Total| r.amount,
            |r: &mut Total, v| r.amount = v,
        )]
    }
}

fn totals() -> Workbook {
    let mut workbook = Workbook::new();
    text(&mut workbook, "Sheet1", "C2", "合計（税込）");
    workbook
        .sheet_mut("Sheet1")
        .unwrap()
        .set_value(addr("C3"), CellValue::Number(1080.0));
    text(&mut workbook, "Sheet1", "E2", "合計（税抜）");
    workbook
        .sheet_mut("Sheet1")
        .unwrap()
        .set_value(addr("E3"), CellValue::Number(1000.0));
    workbook
}

#[test]
fn test_regex_label_takes_first_match_in_scan_order() {
    let config = MapperConfig::default().with_regex_label_text(true);
    let total: Total = SheetMapper::with_config(config)
        .load_from_workbook(&totals())
        .unwrap();
    assert_eq!(total.amount, Some(1080.0));

    // Without regex mode the slashes are literal text
    let result = SheetMapper::new().load_from_workbook::<Total>(&totals());
    assert!(matches!(result, Err(SheetMapError::CellNotFound { .. })));
}

#[test]
fn test_ambiguous_label_can_be_forbidden() {
    let config = MapperConfig::default()
        .with_regex_label_text(true)
        .with_error_on_multiple_label_match(true);
    let result = SheetMapper::with_config(config).load_from_workbook::<Total>(&totals());
    assert!(matches!(result, Err(SheetMapError::CellNotFound { .. })));
}

#[test]
fn test_normalized_labels_from_yaml_config() {
    let yaml = "normalize_label_text: true\ncontinue_type_bind_failure: false\n";
    let config = MapperConfig::from_yaml_str(yaml).unwrap();
    let mut workbook = application("42");
    text(&mut workbook, "申請書", "A2", "氏\n名");

    let form: Application = SheetMapper::with_config(config)
        .load_from_workbook(&workbook)
        .unwrap();
    assert_eq!(form.name.as_deref(), Some("山田 太郎"));
    assert_eq!(form.meta.label("name"), Some("氏\n名"));
}

#[test]
fn test_label_resolution_ignores_unrelated_cells() {
    let mut workbook = application("42");
    let before: Application = SheetMapper::new().load_from_workbook(&workbook).unwrap();
    text(&mut workbook, "申請書", "H20", "unrelated");
    text(&mut workbook, "申請書", "D1", "氏名ではない");
    let after: Application = SheetMapper::new().load_from_workbook(&workbook).unwrap();
    assert_eq!(before.meta, after.meta);
}

#[derive(Debug, Default)]
struct Signature {
    signer: Option<String>,
}

impl Record for Signature {}

impl SheetRecord for Signature {
    fn sheet() -> SheetSelector {
        SheetSelector::index(0)
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::labelled_cell(
            "signer",
            LabelledCellMapping::new("署名").position(LabelPosition::Left),
            |r: &Signature| r.signer.clone(),
            |r: &mut Signature, v| r.signer = v,
        )]
    }
}

#[test]
fn test_merged_value_left_of_label_reports_one_position() {
    let mut workbook = Workbook::new();
    text(&mut workbook, "Sheet1", "D1", "署名");
    text(&mut workbook, "Sheet1", "B1", "佐藤");
    workbook
        .sheet_mut("Sheet1")
        .unwrap()
        .add_merged_region("B1:C1".parse().unwrap());

    let mapper = SheetMapper::new();
    let loaded = mapper.load_detail_from_workbook::<Signature>(&workbook).unwrap();
    assert_eq!(loaded.target().signer.as_deref(), Some("佐藤"));

    let mut signature = Signature {
        signer: Some("鈴木".to_string()),
    };
    let report = mapper.save_to_workbook(&mut workbook, &mut signature).unwrap();
    assert_eq!(
        report.metadata().position("signer"),
        loaded.metadata().position("signer")
    );
    assert_eq!(report.metadata().position("signer"), Some(addr("C1")));

    let sheet = workbook.sheet("Sheet1").unwrap();
    assert_eq!(sheet.formatted_text(addr("B1")), "鈴木");
    assert!(sheet.is_blank(addr("C1")));
}

// ═══════════════════════════════════════════════════════════════════════════
// ARRAY SIZING ON SAVE
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Scores {
    kept: Vec<Option<i32>>,
    cleared: Vec<Option<i32>>,
}

impl Record for Scores {}

impl SheetRecord for Scores {
    fn sheet() -> SheetSelector {
        SheetSelector::index(0)
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![
            FieldBinding::array(
                "kept",
                ArrayMapping::new("A1", 4),
                |r: &Scores| r.kept.clone(),
                |r: &mut Scores, v| r.kept = v,
            ),
            FieldBinding::array(
                "cleared",
                ArrayMapping::new("A2", 4).on_remained(ArrayRemained::Clear),
                |r: &Scores| r.cleared.clone(),
                |r: &mut Scores, v| r.cleared = v,
            ),
        ]
    }
}

fn score_template() -> Workbook {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Sheet1");
    for column in 0..4 {
        sheet.set_value(CellAddress::new(0, column), CellValue::Text("old".into()));
        sheet.set_value(CellAddress::new(1, column), CellValue::Text("old".into()));
    }
    workbook
}

#[test]
fn test_array_remained_none_and_clear() {
    let mut workbook = score_template();
    let mut scores = Scores {
        kept: vec![Some(1), Some(2)],
        cleared: vec![Some(3), Some(4)],
    };
    SheetMapper::new()
        .save_to_workbook(&mut workbook, &mut scores)
        .unwrap();

    let sheet = workbook.sheet("Sheet1").unwrap();
    let row = |r: u32| -> Vec<String> {
        (0..4)
            .map(|c| sheet.formatted_text(CellAddress::new(r, c)))
            .collect()
    };
    assert_eq!(row(0), vec!["1", "2", "old", "old"]);
    assert_eq!(row(1), vec!["3", "4", "", ""]);
}

#[test]
fn test_array_over_break_truncates() {
    let mut workbook = score_template();
    let mut scores = Scores {
        kept: (1..=6).map(Some).collect(),
        cleared: Vec::new(),
    };
    let report = SheetMapper::new()
        .save_to_workbook(&mut workbook, &mut scores)
        .unwrap();

    let sheet = workbook.sheet("Sheet1").unwrap();
    assert_eq!(sheet.formatted_text(addr("D1")), "4");
    assert!(sheet.is_blank(addr("E1")));
    assert_eq!(report.metadata().position("kept[3]"), Some(addr("D1")));
    assert_eq!(report.metadata().position("kept[4]"), None);
    // An empty list with remained None leaves the template alone
    assert_eq!(sheet.formatted_text(addr("A2")), "old");
}

#[test]
fn test_merge_cell_on_save_merges_equal_items() {
    #[derive(Debug, Default)]
    struct Banner {
        parts: Vec<Option<String>>,
    }

    impl Record for Banner {}

    impl SheetRecord for Banner {
        fn sheet() -> SheetSelector {
            SheetSelector::index(0)
        }

        fn fields() -> Vec<FieldBinding<Self>> {
            vec![FieldBinding::array(
                "parts",
                ArrayMapping::new("B2", 4).item_merged(),
                |r: &Banner| r.parts.clone(),
                |r: &mut Banner, v| r.parts = v,
            )]
        }
    }

    let mut workbook = Workbook::new();
    workbook.add_sheet("Sheet1");
    let mut banner = Banner {
        parts: ["a", "a", "b", "c"].iter().map(|s| Some(s.to_string())).collect(),
    };
    let mapper = SheetMapper::with_config(MapperConfig::default().with_merge_cell_on_save(true));
    mapper.save_to_workbook(&mut workbook, &mut banner).unwrap();

    let sheet = workbook.sheet("Sheet1").unwrap();
    assert_eq!(
        sheet.merged_regions().to_vec(),
        vec!["B2:C2".parse::<CellRange>().unwrap()]
    );
    assert_eq!(sheet.formatted_text(addr("B2")), "a");
    assert!(sheet.is_blank(addr("C2")));

    // Without the switch nothing is merged
    let mut plain = Workbook::new();
    plain.add_sheet("Sheet1");
    SheetMapper::new().save_to_workbook(&mut plain, &mut banner).unwrap();
    assert!(plain.sheet("Sheet1").unwrap().merged_regions().is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// SHEET SELECTION
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Monthly {
    sheet: Option<String>,
    total: Option<i64>,
    hooks: Vec<&'static str>,
}

impl Record for Monthly {}

impl SheetRecord for Monthly {
    fn sheet() -> SheetSelector {
        SheetSelector::regex(r"\d{4}-\d{2}")
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::cell(
            "total",
            CellMapping::row_column(0, 1),
            |r: &Monthly| r.total,
            |r: &mut Monthly, v| r.total = v,
        )]
    }

    fn sheet_name(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    fn set_sheet_name(&mut self, name: &str) {
        self.sheet = Some(name.to_string());
    }

    fn pre_load(&mut self) {
        self.hooks.push("pre_load");
    }

    fn post_load(&mut self) {
        self.hooks.push("post_load");
    }

    fn pre_save(&mut self) {
        self.hooks.push("pre_save");
    }

    fn post_save(&mut self) {
        self.hooks.push("post_save");
    }
}

fn months() -> Workbook {
    let mut workbook = Workbook::new();
    workbook.add_sheet("Summary");
    for (name, total) in [("2024-01", 10.0), ("2024-02", 20.0), ("2024-03x", 30.0)] {
        workbook
            .add_sheet(name)
            .set_value(addr("B1"), CellValue::Number(total));
    }
    workbook
}

#[test]
fn test_load_multiple_by_regex() {
    let outcomes = SheetMapper::new()
        .load_multiple_from_workbook::<Monthly>(&months())
        .unwrap();
    // The pattern must match the whole sheet name
    assert_eq!(outcomes.len(), 2);
    let loaded: Vec<(Option<&str>, Option<i64>)> = outcomes
        .iter()
        .map(|o| (o.target().sheet.as_deref(), o.target().total))
        .collect();
    assert_eq!(
        loaded,
        vec![(Some("2024-01"), Some(10)), (Some("2024-02"), Some(20))]
    );
    assert_eq!(outcomes[0].target().hooks, vec!["pre_load", "post_load"]);
}

#[test]
fn test_single_load_rejects_ambiguous_regex() {
    let result = SheetMapper::new().load_from_workbook::<Monthly>(&months());
    assert!(matches!(result, Err(SheetMapError::SheetNotFound(_))));
}

#[test]
fn test_save_multiple_by_sheet_name_then_position() {
    let mut workbook = months();
    let mut records = vec![
        Monthly {
            sheet: Some("2024-02".to_string()),
            total: Some(200),
            ..Default::default()
        },
        Monthly {
            total: Some(100),
            ..Default::default()
        },
    ];
    let reports = SheetMapper::new()
        .save_multiple_to_workbook(&mut workbook, &mut records)
        .unwrap();

    assert_eq!(reports[0].sheet_name(), Some("2024-02"));
    assert_eq!(reports[1].sheet_name(), Some("2024-02"));
    assert_eq!(
        workbook.sheet("2024-02").unwrap().value(addr("B1")),
        &CellValue::Number(100.0)
    );
    assert_eq!(records[0].hooks, vec!["pre_save", "post_save"]);
}

#[test]
fn test_missing_sheet_can_be_ignored() {
    let workbook = Workbook::new();
    let result = SheetMapper::new().load_detail_from_workbook::<Monthly>(&workbook);
    assert!(matches!(result, Err(SheetMapError::SheetNotFound(_))));

    let mapper =
        SheetMapper::with_config(MapperConfig::default().with_ignore_sheet_not_found(true));
    let outcome = mapper.load_detail_from_workbook::<Monthly>(&workbook).unwrap();
    assert!(outcome.is_skipped());
    assert_eq!(outcome.target().total, None);
    assert!(mapper.load_multiple_from_workbook::<Monthly>(&workbook).unwrap().is_empty());
}

#[test]
fn test_sheet_level_failure_only_aborts_that_sheet() {
    let mut workbook = months();
    workbook
        .sheet_mut("2024-02")
        .unwrap()
        .set_value(addr("B1"), CellValue::Text("n/a".into()));
    let mapper =
        SheetMapper::with_config(MapperConfig::default().with_continue_type_bind_failure(false));
    let outcomes = mapper.load_multiple_from_workbook::<Monthly>(&workbook).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(!outcomes[0].has_errors());
    assert_eq!(outcomes[0].target().total, Some(10));
    assert_eq!(outcomes[1].errors()[0].kind, ErrorKind::Conversion);
    assert_eq!(outcomes[1].errors()[0].sheet_name, "2024-02");
}

// ═══════════════════════════════════════════════════════════════════════════
// SIDE CHANNELS
// ═══════════════════════════════════════════════════════════════════════════

/// Keeps positions in plain fields through explicit setters.
#[derive(Debug, Default)]
struct Memo {
    body: Option<String>,
    body_position: Option<CellAddress>,
    body_comment: Option<String>,
}

impl Record for Memo {}

impl SheetRecord for Memo {
    fn sheet() -> SheetSelector {
        SheetSelector::index(0)
    }

    fn fields() -> Vec<FieldBinding<Self>> {
        vec![FieldBinding::cell(
            "body",
            CellMapping::at("C3"),
            |r: &Memo| r.body.clone(),
            |r: &mut Memo, v| r.body = v,
        )
        .on_position(|r: &mut Memo, _, address| r.body_position = Some(address))
        .on_comment(|r: &mut Memo, _, comment| r.body_comment = Some(comment.to_string()))
        .comment_source(|r: &Memo, _| r.body_comment.clone())]
    }
}

#[test]
fn test_comments_and_positions_through_setters() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_sheet("Sheet1");
    sheet.set_value(addr("C3"), CellValue::Text("memo".into()));
    sheet.set_comment(addr("C3"), Some("checked"));

    let mapper = SheetMapper::new();
    let outcome = mapper.load_detail_from_workbook::<Memo>(&workbook).unwrap();
    assert_eq!(outcome.metadata().comment("body"), Some("checked"));
    let mut memo = outcome.into_target();
    assert_eq!(memo.body_position, Some(addr("C3")));
    assert_eq!(memo.body_comment.as_deref(), Some("checked"));

    memo.body_comment = Some("reviewed".to_string());
    let mut output = Workbook::new();
    output.add_sheet("Sheet1");
    let report = mapper.save_to_workbook(&mut output, &mut memo).unwrap();
    assert_eq!(report.metadata().comment("body"), Some("reviewed"));
    assert_eq!(
        output.sheet("Sheet1").unwrap().cell(addr("C3")).comment.as_deref(),
        Some("reviewed")
    );
}

#[test]
fn test_records_without_channels_are_silent() {
    #[derive(Debug, Default)]
    struct Bare {
        body: Option<String>,
    }

    impl Record for Bare {}

    impl SheetRecord for Bare {
        fn sheet() -> SheetSelector {
            SheetSelector::index(0)
        }

        fn fields() -> Vec<FieldBinding<Self>> {
            vec![FieldBinding::cell(
                "body",
                CellMapping::at("A1"),
                |r: &Bare| r.body.clone(),
                |r: &mut Bare, v| r.body = v,
            )]
        }
    }

    let mut workbook = Workbook::new();
    text(&mut workbook, "Sheet1", "A1", "x");
    let outcome = SheetMapper::new().load_detail_from_workbook::<Bare>(&workbook).unwrap();
    assert_eq!(outcome.target().body.as_deref(), Some("x"));
    assert_eq!(outcome.metadata().position("body"), Some(addr("A1")));
}

// ═══════════════════════════════════════════════════════════════════════════
// CONVERTER OVERRIDES
// ═══════════════════════════════════════════════════════════════════════════

struct Shouting;

impl CellConverter<String> for Shouting {
    fn load(
        &self,
        sheet: &Sheet,
        address: CellAddress,
        _: &FieldOptions,
        _: &MapperConfig,
    ) -> Result<Option<String>, ConvertError> {
        let text = sheet.formatted_text(address);
        Ok((!text.is_empty()).then(|| text.to_uppercase()))
    }

    fn save(
        &self,
        sheet: &mut Sheet,
        address: CellAddress,
        value: Option<&String>,
        _: &FieldOptions,
        _: &MapperConfig,
    ) -> Result<(), ConvertError> {
        match value {
            Some(value) => sheet.set_value(address, CellValue::Text(value.to_lowercase())),
            None => sheet.clear(address),
        }
        Ok(())
    }
}

#[test]
fn test_registered_converter_replaces_default() {
    let mut workbook = Workbook::new();
    text(&mut workbook, "Sheet1", "C3", "quiet");
    let mut mapper = SheetMapper::new();
    mapper.registry_mut().register::<String>(Shouting);
    assert!(mapper.registry().contains::<String>());

    let mut memo: Memo = mapper.load_from_workbook(&workbook).unwrap();
    assert_eq!(memo.body.as_deref(), Some("QUIET"));

    memo.body = Some("LOUD".to_string());
    mapper.save_to_workbook(&mut workbook, &mut memo).unwrap();
    assert_eq!(
        workbook.sheet("Sheet1").unwrap().value(addr("C3")),
        &CellValue::Text("loud".to_string())
    );
}
