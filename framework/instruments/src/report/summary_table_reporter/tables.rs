use tabled::Tabled;

#[derive(Tabled)]
pub struct OperationRow {
    pub operation_id: String,
    #[tabled(display = "float2")]
    pub avg_time_ms: f64,
    #[tabled(display = "float2")]
    pub p95_time_ms: f64,
    #[tabled(display = "float2")]
    pub max_time_ms: f64,
    pub total_operations: u64,
    pub errors: u64,
}

#[derive(Tabled)]
pub struct CheckRow {
    pub check: String,
    pub passes: u64,
    pub failures: u64,
    #[tabled(display = "percent")]
    pub pass_rate: f64,
    pub vus: usize,
    pub kind: &'static str,
}

fn float2(n: &f64) -> String {
    format!("{:.2}", n)
}

fn percent(n: &f64) -> String {
    format!("{:.1}%", n * 100.0)
}
