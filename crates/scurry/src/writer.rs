use std::path::Path;
use std::thread::{self, JoinHandle};
use std::{fs, io};

use crossbeam_channel::{unbounded, Sender};

/// One line of the crawl report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Request(String),
    Document { title: String, links: usize },
}

impl Record {
    fn fields(&self) -> Vec<String> {
        match self {
            Self::Request(url) => vec!["request".into(), url.clone()],
            Self::Document { title, links } => {
                vec!["document".into(), title.clone(), links.to_string()]
            }
        }
    }
}

pub enum CsvWriter {
    File(csv::Writer<fs::File>),
    Stdout(csv::Writer<io::Stdout>),
}

impl CsvWriter {
    pub fn open(path: Option<&Path>) -> io::Result<Self> {
        let mut builder = csv::WriterBuilder::new();
        builder.flexible(true);
        Ok(match path {
            Some(path) => Self::File(builder.from_writer(fs::File::create(path)?)),
            None => Self::Stdout(builder.from_writer(io::stdout())),
        })
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(wtr) => wtr.flush(),
            Self::Stdout(wtr) => wtr.flush(),
        }
    }

    pub fn write_record<I, T>(&mut self, record: I) -> csv::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        match self {
            Self::File(wtr) => wtr.write_record(record),
            Self::Stdout(wtr) => wtr.write_record(record),
        }
    }
}

/// Starts the thread writing records to `path` (stdout when `None`).
///
/// The thread stops and flushes once every sender has been dropped.
pub fn spawn(
    path: Option<&Path>,
) -> anyhow::Result<(Sender<Record>, JoinHandle<io::Result<()>>)> {
    let mut wtr = CsvWriter::open(path)?;
    let (tx_record, rx_record) = unbounded::<Record>();

    let handle = thread::Builder::new()
        .name("writer".into())
        .spawn(move || {
            for record in rx_record {
                if let Err(e) = wtr.write_record(record.fields()) {
                    log::error!("Couldn't write record: {e}");
                }
            }
            wtr.flush()
        })?;

    Ok((tx_record, handle))
}
