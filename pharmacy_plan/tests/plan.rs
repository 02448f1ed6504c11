use chrono::NaiveDate;
use demand_forecast::{AgeBand, ForecastTableRow, Region};
use pharmacy_plan::{
    allocation, largest_remainder, AllocationConfig, Allocator, Pharmacy, PharmacyTable, PlanError,
    StockSimulator,
};
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn ym(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap()
}

fn write_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", body).unwrap();
    file
}

fn pharmacy(id: &str, region: Region, population: f64, initial_stock: Option<u64>) -> Pharmacy {
    Pharmacy {
        pharmacy_id: id.to_string(),
        region,
        population,
        initial_stock,
    }
}

#[test]
fn test_allocation_conserves_rounded_total() {
    let mut rng = StdRng::seed_from_u64(2024);

    for _ in 0..1000 {
        let n = rng.gen_range(1..20);
        let populations: Vec<f64> = (0..n)
            .map(|_| {
                if rng.gen_bool(0.1) {
                    0.0
                } else {
                    rng.gen_range(0.0..50_000.0)
                }
            })
            .collect();
        let total = rng.gen_range(0.0..10_000.0);

        let allocation = largest_remainder(total, &populations);

        assert_eq!(allocation.len(), n);
        if populations.iter().sum::<f64>() > 0.0 {
            assert_eq!(allocation.iter().sum::<u64>(), total.round() as u64);
        } else {
            assert!(allocation.iter().all(|q| *q == 0));
        }
    }
}

#[test]
fn test_zero_population_pharmacy_gets_nothing_from_floors() {
    let allocation = largest_remainder(10.0, &[0.0, 100.0]);
    assert_eq!(allocation, vec![0, 10]);
}

#[test]
fn test_pharmacy_csv_is_loaded() {
    let file = write_file(
        "pharmacy_id,region,population,initial_stock\n\
         ph-1,IDF,12000,250\n\
         ph-2,11,\"8000,5\",\n\
         ph-3,ZZZ,500,10\n\
         ph-4,BRE,3000,40\n",
    );

    let table = PharmacyTable::from_csv(file.path()).unwrap();

    assert_eq!(table.len(), 3);
    let ph = table.pharmacies();
    assert_eq!(ph[0], pharmacy("ph-1", Region::IDF, 12000.0, Some(250)));
    assert_eq!(ph[1], pharmacy("ph-2", Region::IDF, 8000.5, None));
    assert_eq!(ph[2].region, Region::BRE);
}

#[test]
fn test_pharmacy_csv_without_stock_column() {
    let file = write_file("pharmacy_id,region,population\nph-1,OCC,100\n");

    let table = PharmacyTable::from_csv(file.path()).unwrap();

    assert_eq!(table.pharmacies()[0].initial_stock, None);
}

#[test]
fn test_pharmacy_csv_missing_column() {
    let file = write_file("pharmacy_id,population\nph-1,100\n");

    match PharmacyTable::from_csv(file.path()).unwrap_err() {
        PlanError::MissingInputColumn { table, column } => {
            assert_eq!(table, "pharmacies");
            assert_eq!(column, "region");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_pharmacy_csv_missing_file() {
    let err = PharmacyTable::from_csv("no/such/pharmacies.csv").unwrap_err();
    assert!(matches!(err, PlanError::FileNotFound(_)));
}

#[test]
fn test_pharmacy_csv_duplicate_id_is_rejected() {
    // "11" is the INSEE code of IDF, so both rows name the same pharmacy
    let file = write_file("pharmacy_id,region,population\nph-1,IDF,100\nph-2,IDF,50\nph-1,11,80\n");

    match PharmacyTable::from_csv(file.path()).unwrap_err() {
        PlanError::DuplicatePharmacy {
            region,
            pharmacy_id,
        } => {
            assert_eq!(region, Region::IDF);
            assert_eq!(pharmacy_id, "ph-1");
        }
        other => panic!("unexpected error: {}", other),
    }
}

fn plan_inputs() -> (PharmacyTable, Vec<ForecastTableRow>) {
    let table = PharmacyTable::new(vec![
        pharmacy("a", Region::IDF, 50.0, Some(30)),
        pharmacy("b", Region::IDF, 30.0, None),
        pharmacy("c", Region::IDF, 20.0, Some(500)),
        pharmacy("z", Region::COR, 10.0, None),
    ])
    .unwrap();

    let row = |date, region, forecast| ForecastTableRow {
        date,
        region,
        age_band: AgeBand::Adult,
        forecast,
        mean_hist: Some(forecast),
        forecast_vs_hist_pct: Some(100.0),
        qty: 100,
        newsvendor_qty: None,
    };
    let forecast = vec![
        row(ym(2024, 11), Region::IDF, 10.0),
        row(ym(2024, 12), Region::IDF, 5.4),
        // no pharmacy in Brittany
        row(ym(2024, 11), Region::BRE, 3.0),
    ];
    (table, forecast)
}

#[test]
fn test_allocation_and_stock_plan() {
    let (table, forecast) = plan_inputs();
    // one hundred thousand people: per-100k forecasts are dose counts
    let populations = [(demand_forecast::SeriesKey::new(Region::IDF, AgeBand::Adult), 100_000.0)]
        .into_iter()
        .collect();

    let totals = allocation::regional_totals(&forecast, &populations, 1_000_000.0);
    assert_eq!(totals[&(ym(2024, 11), Region::BRE)], 30.0);

    let rows = Allocator::new().allocate(&totals, &table);

    let quantities: Vec<(NaiveDate, &str, u64)> = rows
        .iter()
        .map(|r| (r.date, r.pharmacy_id.as_str(), r.consumption))
        .collect();
    assert_eq!(
        quantities,
        vec![
            (ym(2024, 11), "a", 5),
            (ym(2024, 11), "b", 3),
            (ym(2024, 11), "c", 2),
            // 2.7, 1.62, 1.08: the spare unit goes to the 0.7 remainder
            (ym(2024, 12), "a", 3),
            (ym(2024, 12), "b", 1),
            (ym(2024, 12), "c", 1),
        ]
    );

    let stock = StockSimulator::new(AllocationConfig::default())
        .unwrap()
        .simulate(&table, &rows);

    // opening snapshot for all four pharmacies, then two months for IDF
    assert_eq!(stock.len(), 4 + 6);
    assert!(stock[..4].iter().all(|s| s.date == ym(2024, 10) && s.consumption == 0));
    let a: Vec<(u64, u64)> = stock
        .iter()
        .filter(|s| s.pharmacy_id == "a")
        .map(|s| (s.opening_stock, s.closing_stock))
        .collect();
    // declared 30 is raised to the minimum of 100
    assert_eq!(a, vec![(100, 100), (100, 95), (95, 92)]);
    let c = stock.iter().find(|s| s.pharmacy_id == "c").unwrap();
    assert_eq!(c.opening_stock, 500);

    for pair in stock.windows(2) {
        let key = |s: &pharmacy_plan::StockSnapshot| (s.date, s.region, s.pharmacy_id.clone());
        assert!(key(&pair[0]) <= key(&pair[1]));
    }
}

#[test]
fn test_stock_never_goes_negative() {
    let mut rng = StdRng::seed_from_u64(99);
    let table = PharmacyTable::new(
        (0..10)
            .map(|i| pharmacy(&format!("p{}", i), Region::HDF, rng.gen_range(1.0..100.0), None))
            .collect(),
    )
    .unwrap();
    let totals: BTreeMap<(NaiveDate, Region), f64> = (1..=12)
        .map(|m| ((ym(2025, m), Region::HDF), rng.gen_range(0.0..2_000.0)))
        .collect();

    let rows = Allocator::new().allocate(&totals, &table);
    let stock = StockSimulator::new(AllocationConfig::default())
        .unwrap()
        .simulate(&table, &rows);

    assert_eq!(stock.len(), 10 * 13);
    for s in &stock {
        assert_eq!(s.closing_stock, s.opening_stock.saturating_sub(s.consumption));
    }
    // closing carries forward as the next opening
    let mut last: BTreeMap<&str, u64> = BTreeMap::new();
    for s in &stock {
        if let Some(prev) = last.get(s.pharmacy_id.as_str()) {
            assert_eq!(*prev, s.opening_stock);
        }
        last.insert(&s.pharmacy_id, s.closing_stock);
    }
}
