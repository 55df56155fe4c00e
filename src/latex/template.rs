//! The LaTeX document that wraps every transcription.
//!
//! A report-class A4 layout with Italian and English hyphenation, AMS maths,
//! `listings` styles for code written in the notes, and a running header
//! showing the current chapter.

use std::fmt::Write as _;

/// A `\usepackage[options]{name}` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub options: Option<String>,
}

impl Package {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: None,
        }
    }

    pub fn with_options(name: impl Into<String>, options: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Some(options.into()),
        }
    }

    fn line(&self) -> String {
        match &self.options {
            Some(opts) => format!("\\usepackage[{}]{{{}}}", opts, self.name),
            None => format!("\\usepackage{{{}}}", self.name),
        }
    }
}

/// `(options, name)` of every package the template loads, in load order.
const BUILTIN_PACKAGES: &[(Option<&str>, &str)] = &[
    (Some("a4paper,top=3cm,bottom=3cm,left=3cm,right=3cm"), "geometry"),
    (Some("fontsize=13pt"), "scrextend"),
    (Some("english,italian"), "babel"),
    (Some("fixlanguage"), "babelbib"),
    (Some("utf8"), "inputenc"),
    (Some("T1"), "fontenc"),
    (None, "lipsum"),
    (None, "rotating"),
    (None, "fancyhdr"),
    (None, "amssymb"),
    (None, "amsmath"),
    (None, "amsthm"),
    (None, "graphicx"),
    (None, "subcaption"),
    (Some("dvipsnames"), "xcolor"),
    (None, "listings"),
    (None, "hyperref"),
    (Some("normalem"), "ulem"),
    (None, "titlesec"),
    (None, "array"),
];

/// Whether the template already loads `name`.
pub fn is_builtin_package(name: &str) -> bool {
    BUILTIN_PACKAGES.iter().any(|(_, n)| *n == name)
}

const STYLE: &str = r"\pagestyle{fancy}
\fancyhf{}
\lhead{\rightmark}
\rhead{\textbf{\thepage}}
\fancyfoot{}
\setlength{\headheight}{15.6pt}
\fancypagestyle{plain}{
\fancyfoot{}
\fancyhead{}
\renewcommand{\headrulewidth}{0pt}
}
\lstdefinestyle{codeStyle}{
    commentstyle=\color{teal},
    keywordstyle=\color{Magenta},
    numberstyle=\tiny\color{gray},
    stringstyle=\color{violet},
    basicstyle=\ttfamily\footnotesize,
    breakatwhitespace=false,
    breaklines=true,
    captionpos=b,
    keepspaces=true,
    numbers=left,
    numbersep=5pt,
    showspaces=false,
    showstringspaces=false,
    showtabs=false,
    tabsize=2
}
\lstdefinestyle{longBlock}{
    commentstyle=\color{teal},
    keywordstyle=\color{Magenta},
    numberstyle=\tiny\color{gray},
    stringstyle=\color{violet},
    basicstyle=\ttfamily\tiny,
    breakatwhitespace=false,
    breaklines=true,
    captionpos=b,
    keepspaces=true,
    numbers=left,
    numbersep=5pt,
    showspaces=false,
    showstringspaces=false,
    showtabs=false,
    tabsize=2
}
\lstset{style=codeStyle}
\lstset{aboveskip=20pt,belowskip=20pt}
\definecolor{mycolor}{RGB}{0, 112, 192}
\hypersetup{
    colorlinks,
    linkcolor=mycolor,
    citecolor=mycolor
}
\newtheorem{definition}{Definition}[section]
\newtheorem{theorem}{Theorem}[section]
\providecommand*\definitionautorefname{Definition}
\providecommand*\theoremautorefname{Theorem}
\providecommand*\listingautorefname{Listing}
\providecommand*\lstnumberautorefname{Line}
\raggedbottom
";

/// Fills the document template. `title`, `author` and `date` are inserted
/// verbatim and must already be valid LaTeX.
#[derive(Debug, Clone)]
pub struct LatexTemplate {
    pub title: String,
    pub author: String,
    pub date: String,
    extra_packages: Vec<Package>,
}

impl LatexTemplate {
    pub fn new(title: impl Into<String>, author: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            date: date.into(),
            extra_packages: Vec::new(),
        }
    }

    /// Load an additional package after the built-in ones.
    ///
    /// Packages the template already loads, and repeats, are ignored.
    pub fn add_package(&mut self, package: Package) {
        if is_builtin_package(&package.name)
            || self.extra_packages.iter().any(|p| p.name == package.name)
        {
            return;
        }
        self.extra_packages.push(package);
    }

    pub fn extra_packages(&self) -> &[Package] {
        &self.extra_packages
    }

    /// The complete document with `body` between `\maketitle` and
    /// `\end{document}`.
    pub fn render(&self, body: &str) -> String {
        let mut doc = String::with_capacity(STYLE.len() + body.len() + 2048);
        doc.push_str("\\documentclass[a4paper, openright]{report}\n");

        let builtin = BUILTIN_PACKAGES.iter().map(|(opts, name)| Package {
            name: (*name).to_string(),
            options: opts.map(str::to_string),
        });
        for package in builtin.chain(self.extra_packages.iter().cloned()) {
            doc.push_str(&package.line());
            doc.push('\n');
        }

        // Writing into a String cannot fail.
        let _ = writeln!(doc, "\\title{{{}}}", self.title);
        let _ = writeln!(doc, "\\author{{{}}}", self.author);
        let _ = writeln!(doc, "\\date{{{}}}", self.date);
        doc.push_str(STYLE);

        doc.push_str("\\begin{document}\n\\maketitle\n\n");
        doc.push_str(body.trim());
        doc.push_str("\n\n\\end{document}\n");
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_complete_document() {
        let tpl = LatexTemplate::new("Analisi I", "", "\\today");
        let doc = tpl.render("\\section{Limiti}\n");
        assert!(doc.starts_with("\\documentclass[a4paper, openright]{report}\n"));
        assert!(doc.contains("\\usepackage[english,italian]{babel}"));
        assert!(doc.contains("\\title{Analisi I}\n\\author{}\n\\date{\\today}"));
        assert!(doc.contains("\\begin{document}\n\\maketitle\n\n\\section{Limiti}\n\n\\end{document}\n"));
        assert_eq!(doc.matches("\\begin{document}").count(), 1);
    }

    #[test]
    fn extra_packages_follow_builtins_once() {
        let mut tpl = LatexTemplate::new("T", "", "");
        tpl.add_package(Package::new("amsmath"));
        tpl.add_package(Package::with_options("tikz", "draft"));
        tpl.add_package(Package::new("tikz"));
        tpl.add_package(Package::new("siunitx"));
        assert_eq!(tpl.extra_packages().len(), 2);

        let doc = tpl.render("");
        assert_eq!(doc.matches("{amsmath}").count(), 1);
        let array = doc.find("\\usepackage{array}").unwrap();
        let tikz = doc.find("\\usepackage[draft]{tikz}").unwrap();
        let siunitx = doc.find("\\usepackage{siunitx}").unwrap();
        assert!(array < tikz && tikz < siunitx);
        assert!(siunitx < doc.find("\\title{T}").unwrap());
    }
}
