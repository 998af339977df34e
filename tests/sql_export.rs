// SQL export through the public API: the streaming writer and the document exporter.
use rema_export::api::{
    CellValue, ColumnDescriptor, DestinationFormat, ErrorKind, ExportOptions, SqlTableWriter,
    TableWriter, ValueType, parse_document, render, run_and_close,
};

fn script(writer: &SqlTableWriter<Vec<u8>>) -> String {
    String::from_utf8(writer.backend().sink().clone()).expect("utf8")
}

#[test]
fn streaming_writer_freezes_schema_at_second_row() {
    let mut writer = SqlTableWriter::new("People", Vec::new());
    writer.increment_row().expect("row 1");
    writer.write("name", "O'Brien").expect("name");
    writer.write("age", 42i64).expect("age");

    writer.increment_row().expect("row 2");
    writer.write("name", "Ann").expect("name");
    let err = writer.write("city", "Oslo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaFrozen);
    assert_eq!(err.column(), Some("city"));
    assert_eq!(writer.header_count(), 2);

    writer.close().expect("close");
    assert_eq!(
        script(&writer),
        concat!(
            "CREATE TABLE \"People\" (\n",
            "  \"name\" TEXT,\n",
            "  \"age\" INTEGER\n",
            ");\n",
            "INSERT INTO \"People\"(\"name\", \"age\") VALUES ('O''Brien', 42);\n",
            "INSERT INTO \"People\"(\"name\", \"age\") VALUES ('Ann', null);\n",
        )
    );

    let after = writer.increment_row().unwrap_err();
    assert_eq!(after.kind(), ErrorKind::ClosedWriter);
}

#[test]
fn descriptors_rename_type_and_key_columns() {
    let mut writer = SqlTableWriter::new("Lines", Vec::new());
    writer
        .put_column_descriptor(
            "id",
            ColumnDescriptor::new("line_id")
                .with_type(ValueType::Int)
                .primary_key(),
        )
        .expect("id descriptor")
        .put_column_descriptor(
            "owner",
            ColumnDescriptor::new("owner_id").references("Owners", "owner_id"),
        )
        .expect("owner descriptor");

    run_and_close(&mut writer, |writer| {
        writer.increment_row()?;
        writer.write("id", CellValue::Null)?;
        writer.write("owner", "A")
    })
    .expect("session");

    assert_eq!(
        script(&writer),
        concat!(
            "CREATE TABLE \"Lines\" (\n",
            "  \"line_id\" INTEGER,\n",
            "  \"owner_id\" TEXT REFERENCES \"Owners\"(\"owner_id\"),\n",
            "  PRIMARY KEY(\"line_id\")\n",
            ");\n",
            "INSERT INTO \"Lines\"(\"line_id\", \"owner_id\") VALUES (null, 'A');\n",
        )
    );
}

#[test]
fn document_renders_to_a_complete_script() {
    let root = parse_document(
        br#"{
            "TopList": {"Scorecard": [{"Rank": 1, "ProductId": "7001", "Ctime": 0, "Mtime": 1000}]},
            "TransactionsInfo": {"Transactions": [
                {"Id": "T1", "Amount": 10.0, "Receipt": [
                    {"ProductCode": "P1", "Amount": 10.0, "UsedOffers": [
                        {"OfferCode": "O1", "OfferDesc": "Two for one", "DiscountPercent": 50.0}
                    ]}
                ]},
                {"Id": "T2", "Amount": 4.0, "TransactionPayments": [{"MeansOfPaymentDesc": "Cash", "Amount": 4.0}]}
            ]}
        }"#,
    )
    .expect("document");

    let rendered = render(&root, DestinationFormat::Sql, &ExportOptions::default()).expect("render");
    assert_eq!(rendered.summary.format, DestinationFormat::Sql);
    let rows: Vec<(&str, usize)> = rendered
        .summary
        .tables
        .iter()
        .map(|table| (table.name.as_str(), table.rows))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("TopList", 1),
            ("Transactions", 1),
            ("ReceiptEntries", 1),
            ("TransactionsPayments", 0),
            ("UsedOffers", 1),
        ]
    );
    assert_eq!(rendered.summary.total_rows(), 4);

    let sql = String::from_utf8(rendered.bytes).expect("utf8");
    assert!(sql.contains("VALUES (1, '7001', null, null, null, null, 0, 1000, 0, 0, null, 0, 0, null, 0);"));
    assert!(sql.contains("VALUES ('T1', 1, 'O1', 'Two for one', 0, 50);"));
    assert!(!sql.contains("'T2'"));
    assert!(!sql.contains("'Cash'"));
}
