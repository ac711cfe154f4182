mod common;

use std::fs;

use auto_eda::pipeline::{self, EdaOptions};

use common::{TestWorkspace, sales_csv};

fn image_names(outdir: &std::path::Path) -> Vec<String> {
    let images = outdir.join("images");
    if !images.is_dir() {
        return Vec::new();
    }
    let mut names: Vec<String> = fs::read_dir(&images)
        .expect("read images dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn report_covers_sales_scenario() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("sales.csv", &sales_csv());
    let outdir = workspace.path().join("eda_output");

    let report_path =
        pipeline::run_report(&input, &outdir, &EdaOptions::default()).expect("pipeline run");

    assert_eq!(report_path.file_name().unwrap(), "report.md");
    let report = fs::read_to_string(&report_path).expect("read report");

    assert!(report.starts_with("# 自动数据分析报告 (Auto EDA v2)"));
    assert!(report.contains("- 行数: **10**"));
    assert!(report.contains("- 列数: **3**"));
    assert!(report.contains("**datetime**: date"));
    assert!(report.contains("**categorical**: region"));
    assert!(report.contains("**numeric**: sales"));
    // One missing sales value out of ten rows.
    assert!(report.contains("|sales|10.00%|"));
    assert!(report.contains("## 分组洞察"));
    assert!(report.contains("### 按 region 分组（Top 15）"));
    assert!(report.contains("## 核心洞察 | Key Insights"));
}

#[test]
fn report_is_deterministic_across_runs() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("sales.csv", &sales_csv());

    let outdir_a = workspace.path().join("run_a");
    let outdir_b = workspace.path().join("run_b");
    let path_a = pipeline::run_report(&input, &outdir_a, &EdaOptions::default()).expect("run a");
    let path_b = pipeline::run_report(&input, &outdir_b, &EdaOptions::default()).expect("run b");

    let report_a = fs::read_to_string(&path_a).expect("read run a");
    let report_b = fs::read_to_string(&path_b).expect("read run b");
    assert_eq!(report_a, report_b);
    assert_eq!(image_names(&outdir_a), image_names(&outdir_b));
}

#[test]
fn rerun_overwrites_previous_report() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("sales.csv", &sales_csv());
    let outdir = workspace.path().join("eda_output");

    let first = pipeline::run_report(&input, &outdir, &EdaOptions::default()).expect("first run");
    let before = fs::read_to_string(&first).expect("first report");
    let second = pipeline::run_report(&input, &outdir, &EdaOptions::default()).expect("second run");

    assert_eq!(first, second);
    let after = fs::read_to_string(&second).expect("second report");
    assert_eq!(before, after);
}

#[test]
fn unsupported_extension_creates_no_output() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("notes.txt", "not tabular at all");
    let outdir = workspace.path().join("eda_output");

    let err = pipeline::run_report(&input, &outdir, &EdaOptions::default())
        .expect_err("txt input must fail");
    assert!(format!("{err:#}").contains("Unsupported file format: .txt"));
    assert!(!outdir.exists());
}

#[test]
fn text_only_input_still_produces_report() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "labels.csv",
        "kind,note\nfruit,apple\nfruit,pear\nveg,kale\nveg,leek\n",
    );
    let outdir = workspace.path().join("eda_output");

    let report_path =
        pipeline::run_report(&input, &outdir, &EdaOptions::default()).expect("pipeline run");
    let report = fs::read_to_string(&report_path).expect("read report");

    assert!(report.contains("- 行数: **4**"));
    // Numeric-only sections are dropped when no numeric column exists.
    assert!(!report.contains("## 数值字段统计摘要"));
    assert!(!report.contains("## 异常值"));
}

#[test]
fn all_missing_column_skips_its_chart_but_not_the_run() {
    let workspace = TestWorkspace::new();
    let mut csv = String::from("sales,bonus\n");
    for i in 1..=8 {
        csv.push_str(&format!("{},\n", 100 + i));
    }
    let input = workspace.write("bonus.csv", &csv);
    let outdir = workspace.path().join("eda_output");

    let report_path =
        pipeline::run_report(&input, &outdir, &EdaOptions::default()).expect("pipeline run");
    let report = fs::read_to_string(&report_path).expect("read report");

    // The empty column is still typed float and profiled as numeric...
    assert!(report.contains("**numeric**: sales, bonus"));
    assert!(report.contains("|bonus|100.00%|"));
    // ...but its histogram is skipped: no image file, no gallery entry.
    assert!(!report.contains("hist_bonus.png"));
    assert!(!image_names(&outdir).iter().any(|name| name == "hist_bonus.png"));
}

#[test]
fn outlier_row_appears_with_fences() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "values.csv",
        "v\n1\n2\n3\n4\n5\n100\n",
    );
    let outdir = workspace.path().join("eda_output");

    let report_path =
        pipeline::run_report(&input, &outdir, &EdaOptions::default()).expect("pipeline run");
    let report = fs::read_to_string(&report_path).expect("read report");

    assert!(report.contains("|v|1|16.67%|-1.5|8.5|"));
}
