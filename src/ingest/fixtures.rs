/// Test fixtures: representative daily rainfall exports.
///
/// The station export mirrors the layout of a national weather-service daily
/// rainfall download: metadata columns around the four columns the parser
/// needs, a measurement-period column, and a quality flag. The values are
/// truncated to the minimum needed to exercise the parser.

/// Five days around a storm, with extra metadata columns.
/// The 112.6 mm day alone pushes cumulative_14 above the minor threshold.
#[cfg(test)]
pub(crate) fn fixture_station_export_csv() -> &'static str {
    "Product code,Bureau of Meteorology station number,Year,Month,Day,Rainfall amount (millimetres),Period over which rainfall was measured (days),Quality
IDCJAC0009,040913,2022,02,26,0.0,1,Y
IDCJAC0009,040913,2022,02,27,38.4,1,Y
IDCJAC0009,040913,2022,02,28,112.6,1,Y
IDCJAC0009,040913,2022,03,01,85.2,1,N
IDCJAC0009,040913,2022,03,02,4.0,1,N
"
}

/// The three-day request example, as a history file.
#[cfg(test)]
pub(crate) fn fixture_minimal_csv() -> &'static str {
    "Year,Month,Day,Rainfall amount (millimetres)
2023,1,1,50
2023,1,2,60
2023,1,3,40
"
}

/// Non-numeric rainfall on line 3.
#[cfg(test)]
pub(crate) fn fixture_malformed_rainfall_csv() -> &'static str {
    "Year,Month,Day,Rainfall amount (millimetres)
2023,1,1,12.0
2023,1,2,lots
2023,1,3,0.0
"
}

/// A deterministic multi-year history with periodic wet spells, long enough
/// for every severity class to appear after feature derivation.
#[cfg(test)]
pub(crate) fn fixture_history_csv(days: usize) -> String {
    use chrono::{Datelike, Duration, NaiveDate};

    let start = NaiveDate::from_ymd_opt(2015, 1, 1).expect("valid start date");
    let mut csv = String::from("Year,Month,Day,Rainfall amount (millimetres)\n");

    for i in 0..days {
        let date = start + Duration::days(i as i64);
        csv.push_str(&format!(
            "{},{},{},{:.1}\n",
            date.year(),
            date.month(),
            date.day(),
            synthetic_rainfall(i)
        ));
    }

    csv
}

/// Rainfall for day `i` of the synthetic history.
///
/// Mostly light drizzle, with a wet spell every 45 days whose peak grows
/// through a 4-spell cycle so that minor, moderate and major labels all occur.
#[cfg(test)]
pub(crate) fn synthetic_rainfall(i: usize) -> f64 {
    let drizzle = ((i * 37) % 11) as f64 * 0.4;
    let phase = i % 45;
    if phase < 5 {
        let spell = (i / 45) % 4;
        let peak = 20.0 + 25.0 * spell as f64;
        drizzle + peak - (phase as f64) * 3.0
    } else {
        drizzle
    }
}
