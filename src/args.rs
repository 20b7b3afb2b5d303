use clap::{Parser, Subcommand};

/// This is a navigation and consistency checker for household travel-survey interviews.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// (file path) The interview, in JSON format. Either a full interview object with a
    /// `responses` field, or the responses object alone.
    #[clap(short, long, value_parser)]
    pub interview: String,

    /// (file path, optional) The survey configuration in JSON format. All the keys are optional.
    /// For more information about the file format, read the `manual` module of the library.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) A reference file containing the expected output in JSON format. If provided,
    /// odnav will check that its output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the output will be written in JSON format to
    /// the given location. By default, it is printed to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reports the completion of each section and the next visited place and trip of each person.
    Status,
    /// Computes the updates that repair the visited places of the active person.
    Repair,
    /// Computes the removals and updates for deleting a visited place of the active person.
    DeletePlace {
        /// (dotted path) The visited place, for example `household.persons.P.visitedPlaces.V`.
        #[clap(short, long, value_parser)]
        path: String,
    },
    /// Computes the removals and updates for removing a visited place and merging its trips.
    MergePlace {
        /// (dotted path) The visited place, for example `household.persons.P.visitedPlaces.V`.
        #[clap(short, long, value_parser)]
        path: String,
    },
}
