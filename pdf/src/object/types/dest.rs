use super::prelude::*;

/// The page a destination points to: a page object in this document, or a page number (for
/// destinations into other documents).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DestPage {
    Ref(PlainRef),
    Number(i64),
}
impl Object for DestPage {
    fn from_primitive(p: Primitive, _: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Reference(r) => Ok(DestPage::Ref(r)),
            Primitive::Integer(n) => Ok(DestPage::Number(n)),
            p => Err(PdfError::UnexpectedPrimitive {
                expected: "Reference | Integer",
                found: p.get_debug_name(),
            }),
        }
    }
}
impl ObjectWrite for DestPage {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(match *self {
            DestPage::Ref(r) => Primitive::Reference(r),
            DestPage::Number(n) => Primitive::Integer(n),
        })
    }
}
impl From<PlainRef> for DestPage {
    fn from(r: PlainRef) -> DestPage {
        DestPage::Ref(r)
    }
}

/// How the target page is framed. Coordinates that are left open (`null` in the file, or simply
/// missing) are `None`; they are written as `0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DestView {
    // left, top, zoom
    XYZ {
        left: Option<f32>,
        top: Option<f32>,
        zoom: Option<f32>,
    },
    Fit,
    FitH {
        top: Option<f32>,
    },
    FitV {
        left: Option<f32>,
    },
    FitR {
        left: Option<f32>,
        bottom: Option<f32>,
        right: Option<f32>,
        top: Option<f32>,
    },
    FitB,
    FitBH {
        top: Option<f32>,
    },
    FitBV {
        left: Option<f32>,
    },
}

impl DestView {
    /// Build a view from the fit mode name and its numeric arguments. Missing trailing arguments
    /// are left open; an unknown mode is an error.
    pub fn from_args(mode: &str, args: &[Primitive]) -> Result<DestView> {
        let arg = |i: usize| -> Result<Option<f32>> {
            match args.get(i) {
                None | Some(Primitive::Null) => Ok(None),
                Some(&Primitive::Integer(n)) => Ok(Some(n as f32)),
                Some(&Primitive::Number(f)) => Ok(Some(f)),
                Some(p) => Err(PdfError::UnexpectedPrimitive {
                    expected: "Number | Integer | Null",
                    found: p.get_debug_name(),
                }),
            }
        };
        let view = match mode {
            "XYZ" => DestView::XYZ { left: arg(0)?, top: arg(1)?, zoom: arg(2)? },
            "Fit" => DestView::Fit,
            "FitB" => DestView::FitB,
            "FitH" => DestView::FitH { top: arg(0)? },
            "FitBH" => DestView::FitBH { top: arg(0)? },
            "FitV" => DestView::FitV { left: arg(0)? },
            "FitBV" => DestView::FitBV { left: arg(0)? },
            "FitR" => DestView::FitR { left: arg(0)?, bottom: arg(1)?, right: arg(2)?, top: arg(3)? },
            other => return Err(PdfError::read(format!("Unknown Destination Type: {}", other))),
        };
        Ok(view)
    }

    pub fn mode(&self) -> &'static str {
        match self {
            DestView::XYZ { .. } => "XYZ",
            DestView::Fit => "Fit",
            DestView::FitH { .. } => "FitH",
            DestView::FitV { .. } => "FitV",
            DestView::FitR { .. } => "FitR",
            DestView::FitB => "FitB",
            DestView::FitBH { .. } => "FitBH",
            DestView::FitBV { .. } => "FitBV",
        }
    }

    /// The numeric arguments in file order.
    pub fn args(&self) -> Vec<Option<f32>> {
        match *self {
            DestView::XYZ { left, top, zoom } => vec![left, top, zoom],
            DestView::Fit | DestView::FitB => vec![],
            DestView::FitH { top } | DestView::FitBH { top } => vec![top],
            DestView::FitV { left } | DestView::FitBV { left } => vec![left],
            DestView::FitR { left, bottom, right, top } => vec![left, bottom, right, top],
        }
    }
}

/// A direct destination: `[page /Mode args...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dest {
    pub page: DestPage,
    pub view: DestView,
}
impl Dest {
    fn from_array(array: &[Primitive], resolve: &impl Resolve) -> Result<Self> {
        let page = DestPage::from_primitive(try_opt!(array.first()).clone(), resolve)?;
        let mode = try_opt!(array.get(1)).as_name()?;
        let view = DestView::from_args(mode, &array[2..])?;
        Ok(Dest { page, view })
    }
}
impl Object for Dest {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        let p = match p.resolve(resolve)? {
            Primitive::Dictionary(mut dict) => dict.require("Dest", "D")?.resolve(resolve)?,
            p => p,
        };
        Dest::from_array(p.as_array()?, resolve)
    }
}
impl ObjectWrite for Dest {
    fn to_primitive(&self) -> Result<Primitive> {
        let mut arr = vec![self.page.to_primitive()?, Primitive::name(self.view.mode())];
        arr.extend(self.view.args().into_iter().map(|a| Primitive::Number(a.unwrap_or(0.0))));
        Ok(Primitive::Array(arr))
    }
}

/// A titled jump target.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub title: String,
    pub dest: Dest,
}
impl Destination {
    /// `mode` is the fit mode name without the slash, `args` its numeric arguments (`null`
    /// allowed).
    pub fn new(title: impl Into<String>, page: impl Into<DestPage>, mode: &str, args: &[Primitive]) -> Result<Destination> {
        Ok(Destination {
            title: title.into(),
            dest: Dest {
                page: page.into(),
                view: DestView::from_args(mode, args)?,
            },
        })
    }
    pub fn page(&self) -> DestPage {
        self.dest.page
    }
    pub fn view(&self) -> &DestView {
        &self.dest.view
    }

    /// `[page /Mode args...]`
    pub fn dest_array(&self) -> Result<Primitive> {
        self.dest.to_primitive()
    }

    /// `<< /D [...] /S /GoTo >>`
    pub fn goto_action(&self) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        dict.insert("D", self.dest_array()?);
        dict.insert("S", Primitive::name("GoTo"));
        Ok(dict)
    }
}
impl ObjectWrite for Destination {
    fn to_primitive(&self) -> Result<Primitive> {
        self.goto_action().map(Primitive::Dictionary)
    }
}
