//! Tabular output files, UPDATE scripts, and the optional upload path.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::model::ObjectType;

/// Marker appended to xref and object_xref rows produced by the dependent
/// closure.
pub const DEPENDENT_MARKER: &str = "DEPENDENT";

/// The seven bulk-loadable tables, in upload order.
pub const TABLES: [&str; 7] = [
    "xref",
    "object_xref",
    "identity_xref",
    "external_synonym",
    "go_xref",
    "interpro",
    "gene_description",
];

/// Packaged external_db reference table, loaded when the target's table is
/// empty.
const EXTERNAL_DB_TABLE: &str = include_str!("../data/external_db.txt");

fn table_writer(workdir: &Path, name: &str) -> Result<BufWriter<File>, Error> {
    Ok(BufWriter::new(File::create(workdir.join(name))?))
}

/// Open writers for the full output file set in the working directory.
///
/// Within each file, rows appear in the order the producing stage emits
/// them; write-once per run.
pub struct TableWriters {
    xref: BufWriter<File>,
    object_xref: BufWriter<File>,
    identity_xref: BufWriter<File>,
    external_synonym: BufWriter<File>,
    go_xref: BufWriter<File>,
    interpro: BufWriter<File>,
    gene_description: BufWriter<File>,
    transcript_display_sql: BufWriter<File>,
    transcript_display_txt: BufWriter<File>,
    gene_display_sql: BufWriter<File>,
    gene_display_txt: BufWriter<File>,
}

impl TableWriters {
    pub fn create(workdir: &Path) -> Result<Self, Error> {
        Ok(Self {
            xref: table_writer(workdir, "xref.txt")?,
            object_xref: table_writer(workdir, "object_xref.txt")?,
            identity_xref: table_writer(workdir, "identity_xref.txt")?,
            external_synonym: table_writer(workdir, "external_synonym.txt")?,
            go_xref: table_writer(workdir, "go_xref.txt")?,
            interpro: table_writer(workdir, "interpro.txt")?,
            gene_description: table_writer(workdir, "gene_description.txt")?,
            transcript_display_sql: table_writer(workdir, "transcript_display_xref.sql")?,
            transcript_display_txt: table_writer(workdir, "transcript_display_xref.txt")?,
            gene_display_sql: table_writer(workdir, "gene_display_xref.sql")?,
            gene_display_txt: table_writer(workdir, "gene_display_xref.txt")?,
        })
    }

    pub fn xref(
        &mut self,
        xref_id: u64,
        external_db_id: u64,
        accession: &str,
        label: &str,
        version: u32,
        description: &str,
        dependent: bool,
    ) -> Result<(), Error> {
        write!(
            self.xref,
            "{xref_id}\t{external_db_id}\t{accession}\t{label}\t{version}\t{description}"
        )?;
        if dependent {
            write!(self.xref, "\t{DEPENDENT_MARKER}")?;
        }
        writeln!(self.xref)?;
        Ok(())
    }

    pub fn object_xref(
        &mut self,
        object_xref_id: u64,
        object_id: u64,
        object_type: ObjectType,
        xref_id: u64,
        dependent: bool,
    ) -> Result<(), Error> {
        write!(
            self.object_xref,
            "{object_xref_id}\t{object_id}\t{object_type}\t{xref_id}"
        )?;
        if dependent {
            write!(self.object_xref, "\t{DEPENDENT_MARKER}")?;
        }
        writeln!(self.object_xref)?;
        Ok(())
    }

    pub fn identity_xref(
        &mut self,
        object_xref_id: u64,
        query_identity: u32,
        target_identity: u32,
        query_start: u64,
        query_end: u64,
        target_start: u64,
        target_end: u64,
        cigar: &str,
        score: &str,
        analysis_id: u64,
    ) -> Result<(), Error> {
        // evalue is unknown for exonerate output; emit the SQL null literal
        writeln!(
            self.identity_xref,
            "{object_xref_id}\t{query_identity}\t{target_identity}\t{query_start}\t{query_end}\t\
             {target_start}\t{target_end}\t{cigar}\t{score}\t\\N\t{analysis_id}"
        )?;
        Ok(())
    }

    pub fn external_synonym(&mut self, xref_id: u64, synonym: &str) -> Result<(), Error> {
        writeln!(self.external_synonym, "{xref_id}\t{synonym}")?;
        Ok(())
    }

    pub fn go_xref(&mut self, object_xref_id: u64, linkage: &str) -> Result<(), Error> {
        writeln!(self.go_xref, "{object_xref_id}\t{linkage}")?;
        Ok(())
    }

    pub fn interpro(&mut self, interpro: &str, pfam: &str) -> Result<(), Error> {
        writeln!(self.interpro, "{interpro}\t{pfam}")?;
        Ok(())
    }

    pub fn gene_description(&mut self, gene_id: u64, description: &str) -> Result<(), Error> {
        writeln!(self.gene_description, "{gene_id}\t{description}")?;
        Ok(())
    }

    pub fn transcript_display(&mut self, xref_id: u64, transcript_id: u64) -> Result<(), Error> {
        writeln!(
            self.transcript_display_sql,
            "UPDATE transcript SET display_xref_id={xref_id} WHERE transcript_id={transcript_id};"
        )?;
        writeln!(self.transcript_display_txt, "{xref_id}\t{transcript_id}")?;
        Ok(())
    }

    pub fn gene_display(&mut self, xref_id: u64, gene_id: u64) -> Result<(), Error> {
        writeln!(
            self.gene_display_sql,
            "UPDATE gene SET display_xref_id={xref_id} WHERE gene_id={gene_id};"
        )?;
        writeln!(self.gene_display_txt, "{xref_id}\t{gene_id}")?;
        Ok(())
    }

    /// Flush everything to disk.
    pub fn finish(mut self) -> Result<(), Error> {
        for writer in [
            &mut self.xref,
            &mut self.object_xref,
            &mut self.identity_xref,
            &mut self.external_synonym,
            &mut self.go_xref,
            &mut self.interpro,
            &mut self.gene_description,
            &mut self.transcript_display_sql,
            &mut self.transcript_display_txt,
            &mut self.gene_display_sql,
            &mut self.gene_display_txt,
        ] {
            writer.flush()?;
        }
        Ok(())
    }
}

/// The contract placed on the external bulk loader.
pub trait Loader {
    fn table_is_empty(&mut self, table: &str) -> Result<bool, Error>;
    /// Bulk-load a tab-separated file into the named table, ignoring
    /// duplicate rows; optionally truncate the table first.
    fn bulk_load(&mut self, table: &str, path: &Path, truncate: bool) -> Result<(), Error>;
    /// Execute the UPDATE statements of an emitted SQL script.
    fn run_script(&mut self, path: &Path) -> Result<(), Error>;
}

/// Upload the emitted file set through a loader.
///
/// An empty external_db table in the target is bootstrapped from the
/// packaged reference table first.
pub fn upload(workdir: &Path, loader: &mut dyn Loader, truncate: bool) -> Result<(), Error> {
    if loader.table_is_empty("external_db")? {
        let packaged = workdir.join("external_db.txt");
        std::fs::write(&packaged, EXTERNAL_DB_TABLE)?;
        loader.bulk_load("external_db", &packaged, false)?;
    }

    for table in TABLES {
        loader.bulk_load(table, &workdir.join(format!("{table}.txt")), truncate)?;
    }

    loader.run_script(&workdir.join("transcript_display_xref.sql"))?;
    loader.run_script(&workdir.join("gene_display_xref.sql"))?;
    Ok(())
}

/// Output files from a previous run, removed when `--delete-existing` is set.
pub fn delete_existing_outputs(workdir: &Path) -> Result<usize, Error> {
    let mut removed = 0;
    for entry in std::fs::read_dir(workdir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let stale = name.ends_with(".map")
            || name.ends_with(".sql")
            || name.ends_with(".fasta")
            || TABLES.iter().any(|t| name == format!("{t}.txt"))
            || matches!(
                name,
                "transcript_display_xref.txt" | "gene_display_xref.txt" | "external_db.txt"
            );
        if stale {
            std::fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Expected map-file path for a method, kind, and rule index.
pub fn map_file_path(
    workdir: &Path,
    method: &str,
    kind: crate::model::SequenceKind,
    rule_index: usize,
) -> PathBuf {
    workdir.join(format!("{method}_{}_{rule_index}.map", kind.as_str()))
}
