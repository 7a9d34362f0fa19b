use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    #[clap(
        short,
        long,
        global = true,
        default_value_t = 0,
        help = "Number of threads to use (0 for all logical cores)"
    )]
    pub threads: usize,

    #[clap(short, long, global = true, action = clap::ArgAction::Count, help = "Verbosity level (e.g., -v, -vv)")]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a MerStreamFile and a PositionDB from FASTA/FASTQ input
    Index(IndexArgs),
    /// Look up k-mers against a previously built PositionDB
    Query(QueryArgs),
    /// Build a KmerCountStore from FASTA/FASTQ input and dump (kmer, count) pairs
    Count(CountArgs),
    /// Chain a TSV of local-alignment segments into one or more overlaps
    Chain(ChainArgs),
}

#[derive(Parser, Debug)]
pub struct IndexArgs {
    #[clap(short, long, required = true, help = "The length of the k-mer (1..=31)")]
    pub kmer_size: u8,

    #[clap(short, long, required = true, num_args = 1.., help = "One or more input FASTA/FASTQ files (can be gzipped)")]
    pub input_files: Vec<PathBuf>,

    #[clap(
        short,
        long,
        required = true,
        help = "Output path prefix; writes <prefix>.mers and <prefix>.posdb"
    )]
    pub output_prefix: PathBuf,

    #[clap(long, default_value_t = 0, help = "Stride between indexed mers (0 = every mer)")]
    pub skip: u32,

    #[clap(
        long,
        help = "Number of bits of hash prefix for the position-DB table (default: derived from k)"
    )]
    pub tbl_bits: Option<u32>,

    #[clap(long, help = "Memory budget in bytes (default: a fraction of total system memory)")]
    pub memory_budget: Option<u64>,

    #[clap(
        long,
        conflicts_with = "only_kmers",
        help = "One k-mer sequence per line; reject any mer found in this set"
    )]
    pub mask_kmers: Option<PathBuf>,

    #[clap(
        long,
        conflicts_with = "mask_kmers",
        help = "One k-mer sequence per line; accept only mers found in this set"
    )]
    pub only_kmers: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct QueryArgs {
    #[clap(short = 'd', long = "database", required = true, help = "PositionDB file previously written by `index`")]
    pub database_file: PathBuf,

    #[clap(short = 'k', long = "kmer", num_args = 0.., help = "K-mer(s) given directly on the command line")]
    pub kmers: Vec<String>,

    #[clap(short = 'f', long = "kmer-file", help = "File with one k-mer per line")]
    pub kmer_file: Option<PathBuf>,

    #[clap(short, long, help = "Output file for hit positions (defaults to stdout)")]
    pub output_file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CountArgs {
    #[clap(short, long, required = true, help = "The length of the k-mer (1..=31)")]
    pub kmer_size: u8,

    #[clap(short, long, required = true, num_args = 1.., help = "One or more input FASTA/FASTQ files (can be gzipped)")]
    pub input_files: Vec<PathBuf>,

    #[clap(short, long, required = true, help = "Output file for the (kmer, count) table (CSV)")]
    pub output_file: PathBuf,

    #[clap(long, help = "Directory for intermediate spill runs (default: a temp dir)")]
    pub spill_dir: Option<PathBuf>,

    #[clap(long, help = "Memory budget in bytes (default: a fraction of total system memory)")]
    pub memory_budget: Option<u64>,

    #[clap(long, help = "Estimate of the total number of mers, used to size partitions")]
    pub estimated_num_mers: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct ChainArgs {
    #[clap(
        short,
        long,
        required = true,
        help = "TSV of segments: a_begin a_end b_begin b_end score error_rate (header line optional)"
    )]
    pub segments_file: PathBuf,

    #[clap(long, required = true, help = "Length of sequence A")]
    pub a_len: i64,

    #[clap(long, required = true, help = "Length of sequence B")]
    pub b_len: i64,

    #[clap(long, default_value_t = 3, help = "Minimum usable gap width")]
    pub min_usable: i64,

    #[clap(long, default_value_t = 30, help = "Minimum aligned columns for a reported overlap")]
    pub min_aligned_cols: i64,

    #[clap(long, default_value_t = 10, help = "Gap-size threshold for minor-vs-major gap classification")]
    pub minor_thresh: i64,

    #[clap(long, help = "Treat the segments as matches against the complement strand of B")]
    pub complement: bool,

    #[clap(long, default_value_t = 1, help = "How many overlaps to report, via repeated next_best calls")]
    pub count: usize,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
