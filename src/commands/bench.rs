//! `bench` subcommand: time the analysis and report counts.

use crate::STDRESULT;
use crate::server::Analysis;

pub fn bench(cmd: &clap::ArgMatches) -> STDRESULT {
    let doc = super::document_from_matches(cmd)?;
    let mut analyzer = super::analyzer_from_matches(cmd)?;
    let lines = doc.text.lines().count();
    let started = chrono::Local::now();
    let begin = std::time::Instant::now();
    analyzer.analyze(&doc)?;
    let elapsed = begin.elapsed();
    let [err,warn,info] = analyzer.err_warn_info_counts();
    println!("started    {}",started.format("%Y-%m-%d %H:%M:%S"));
    println!("document   {}",doc.uri);
    println!("lines      {}",lines);
    println!("elapsed    {:.3} ms",elapsed.as_secs_f64()*1000.0);
    println!("errors     {}",err);
    println!("warnings   {}",warn);
    println!("notes      {}",info);
    Ok(())
}
