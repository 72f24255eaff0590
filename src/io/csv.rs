/*!
# Saving Live Points and Step Traces to CSV

Plain-text exports for inspecting a run in external tools. Enable via the
`csv` feature.
*/

use ndarray::{ArrayView1, Axis};
use std::error::Error;
use std::fs::File;

use csv::Writer;

use crate::core::LivePoints;
use crate::stepsampler::{StepEvent, StepTrace};

/**
Saves the live points as a CSV file.

The resulting CSV file will have:
- A header row with one column per dimension named `"dim_0"`, `"dim_1"`,
  etc., followed by `"logl"`.
- One row per live point with its unit-cube coordinates and log-likelihood.

# Examples

```rust
use mini_nest::core::LivePoints;
use mini_nest::io::csv::save_live_points;
use ndarray::array;

let live = LivePoints::new(array![[0.1, 0.2], [0.3, 0.4]], array![-1.0, -2.0]).unwrap();
save_live_points(&live, "/tmp/live_points.csv").expect("Expecting saving data to succeed");
```
*/
pub fn save_live_points(live: &LivePoints, filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let mut header: Vec<String> = (0..live.ndim()).map(|i| format!("dim_{}", i)).collect();
    header.push("logl".to_string());
    wtr.write_record(&header)?;

    for (u, logl) in live.u().axis_iter(Axis(0)).zip(live.logl()) {
        let mut row: Vec<String> = u.iter().map(|x| x.to_string()).collect();
        row.push(logl.to_string());
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/**
Saves a step trace as a CSV file, one row per point mentioned by an event.

Columns are `"step"` (index of the event in the trace), `"event"`, one
`"dim_i"` column per dimension and `"logl"`, which stays empty for events
that carry no likelihood. Events that mention several points, like a
batch of proposals or a slice bracket, produce several rows with the same
`step`.

An empty trace produces an empty file.
*/
pub fn save_trace(trace: &StepTrace, filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let n_dims = match trace.events.iter().flat_map(event_rows).next() {
        Some((_, u, _)) => u.len(),
        None => {
            wtr.flush()?;
            return Ok(());
        }
    };

    let mut header = vec!["step".to_string(), "event".to_string()];
    header.extend((0..n_dims).map(|i| format!("dim_{}", i)));
    header.push("logl".to_string());
    wtr.write_record(&header)?;

    for (step, event) in trace.events.iter().enumerate() {
        for (label, u, logl) in event_rows(event) {
            let mut row = vec![step.to_string(), label.to_string()];
            row.extend(u.iter().map(|x| x.to_string()));
            row.push(logl.map(|l| l.to_string()).unwrap_or_default());
            wtr.write_record(&row)?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn event_rows(event: &StepEvent) -> Vec<(&'static str, ArrayView1<'_, f64>, Option<f64>)> {
    match event {
        StepEvent::Start { u } => vec![("start", u.view(), None)],
        StepEvent::Proposed { points } => points
            .axis_iter(Axis(0))
            .map(|p| ("proposed", p, None))
            .collect(),
        StepEvent::OutsideRegion { points } => points
            .axis_iter(Axis(0))
            .map(|p| ("outside", p, None))
            .collect(),
        StepEvent::Rejected { u, logl } => vec![("rejected", u.view(), Some(*logl))],
        StepEvent::Probed { u, logl } => vec![("probed", u.view(), Some(*logl))],
        StepEvent::Accepted { from, u, logl } => vec![
            ("moved_from", from.view(), None),
            ("accepted", u.view(), Some(*logl)),
        ],
        StepEvent::SliceBracket { left, right } => vec![
            ("bracket_left", left.view(), None),
            ("bracket_right", right.view(), None),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::fs;
    use tempfile::NamedTempFile;

    #[test]
    fn test_save_live_points() -> Result<(), Box<dyn Error>> {
        let live = LivePoints::new(array![[0.25, 0.5], [0.75, 1.0]], array![-1.5, -0.5])?;
        let file = NamedTempFile::new()?;
        let filename = file.path().to_str().unwrap();
        save_live_points(&live, filename)?;

        let contents = fs::read_to_string(filename)?;
        let expected = "dim_0,dim_1,logl\n0.25,0.5,-1.5\n0.75,1,-0.5\n";
        assert_eq!(contents, expected);
        Ok(())
    }

    #[test]
    fn test_save_trace() -> Result<(), Box<dyn Error>> {
        let trace = StepTrace {
            events: vec![
                StepEvent::Start { u: array![0.5, 0.5] },
                StepEvent::Proposed {
                    points: array![[0.4, 0.5], [0.6, 0.5]],
                },
                StepEvent::Rejected {
                    u: array![0.4, 0.5],
                    logl: -2.0,
                },
                StepEvent::Accepted {
                    from: array![0.5, 0.5],
                    u: array![0.6, 0.5],
                    logl: -0.5,
                },
            ],
        };
        let file = NamedTempFile::new()?;
        let filename = file.path().to_str().unwrap();
        save_trace(&trace, filename)?;

        let contents = fs::read_to_string(filename)?;
        let expected = "step,event,dim_0,dim_1,logl\n\
                        0,start,0.5,0.5,\n\
                        1,proposed,0.4,0.5,\n\
                        1,proposed,0.6,0.5,\n\
                        2,rejected,0.4,0.5,-2\n\
                        3,moved_from,0.5,0.5,\n\
                        3,accepted,0.6,0.5,-0.5\n";
        assert_eq!(contents, expected);
        Ok(())
    }

    #[test]
    fn test_save_empty_trace() -> Result<(), Box<dyn Error>> {
        let file = NamedTempFile::new()?;
        let filename = file.path().to_str().unwrap();
        save_trace(&StepTrace::new(), filename)?;
        assert_eq!(fs::read_to_string(filename)?, "");
        Ok(())
    }
}
